//! Backend collections the console manages.

use derive_more::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[non_exhaustive]
pub enum Collection {
    #[display("processes")]
    Processes,
    #[display("operations")]
    Operations,
    #[display("tasks")]
    Tasks,
    #[display("objectives")]
    Objectives,
    #[display("indicators")]
    Indicators,
    #[display("documents")]
    Documents,
    #[display("tickets")]
    Tickets,
    #[display("meetings")]
    Meetings,
    #[display("surveys")]
    Surveys,
    #[display("candidates")]
    Candidates,
    #[display("non-conformities")]
    NonConformities,
    #[display("audits")]
    Audits,
    #[display("data")]
    Data,
}

impl Collection {
    pub const ALL: [Self; 13] = [
        Self::Processes,
        Self::Operations,
        Self::Tasks,
        Self::Objectives,
        Self::Indicators,
        Self::Documents,
        Self::Tickets,
        Self::Meetings,
        Self::Surveys,
        Self::Candidates,
        Self::NonConformities,
        Self::Audits,
        Self::Data,
    ];

    /// Path relative to the backend base URL.
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Processes => "Process",
            Self::Operations => "operations",
            Self::Tasks => "tasks",
            Self::Objectives => "Objective",
            Self::Indicators => "api/indicators",
            Self::Documents => "documents",
            Self::Tickets => "api/tickets",
            Self::Meetings => "meetings",
            Self::Surveys => "api/surveys",
            Self::Candidates => "api/candidates",
            Self::NonConformities => "api/nonconformities",
            Self::Audits => "audits",
            Self::Data => "data",
        }
    }

    /// Whether DELETE on this collection answers with a plain-text body.
    #[must_use]
    pub fn deletes_as_text(self) -> bool {
        matches!(self, Self::Data)
    }
}
