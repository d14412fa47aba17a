
/// Operations the executor knows how to dispatch.
///
/// Invocations keep the raw name as a string; this enum is only the
/// closed set the registry registers built-ins under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    ReadFile,
    WriteFile,
}

impl ToolName {
    pub const ALL: [ToolName; 2] = [ToolName::ReadFile, ToolName::WriteFile];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ToolName::ReadFile => "read_file",
            ToolName::WriteFile => "write_file",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|name| name.as_str() == raw)
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool call extracted from one model completion.
///
/// `target_path` is untrusted. `payload` is empty when the content tag is
/// absent; only `write_file` reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    name: String,
    target_path: String,
    payload: String,
}

impl ToolInvocation {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        target_path: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target_path: target_path.into(),
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn tool(&self) -> Option<ToolName> {
        ToolName::parse(&self.name)
    }

    #[must_use]
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    #[must_use]
    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// The user's answer to one consent prompt. Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    Granted,
    Denied,
}

impl ConsentDecision {
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, ConsentDecision::Granted)
    }
}
