use thiserror::Error;

#[derive(Error, Debug)]
pub enum FabError {
    #[error("format error: {0}")]
    Format(String),

    #[error("state error: {0}")]
    State(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("malformed expression: {0}")]
    MalformedExpression(String),

    #[error("in command `{command}`: {source}")]
    Command {
        command: String,
        #[source]
        source: Box<FabError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FabError {
    /// Attach the offending command text, unless it is already attached.
    pub fn in_command(self, command: &str) -> FabError {
        match self {
            FabError::Command { .. } => self,
            other => FabError::Command {
                command: command.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// The underlying error with any command context peeled off.
    pub fn root(&self) -> &FabError {
        match self {
            FabError::Command { source, .. } => source.root(),
            other => other,
        }
    }
}
