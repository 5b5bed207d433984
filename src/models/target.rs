use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// URL scheme of the long-lived consumer host process.
pub const HUB_SCHEME: &str = "sidedrop";

/// Executable name of the consumer host, as seen in the process table.
pub const HUB_PROCESS: &str = "sidedrop";

/// URL that wakes the consumer host so it can run a dispatch pass for the
/// given record.
pub fn hub_wake_url(request_id: Uuid) -> String {
    format!("{HUB_SCHEME}://wake?source=share&id={request_id}")
}

/// Closed set of destination applications a handoff can be routed to.
///
/// Ids are stable strings used as storage-key prefixes, so renaming or
/// reusing one is a breaking change for records already sitting in the
/// shared directory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Target {
    Ticket,
    Note,
    Task,
    Journal,
}

impl Target {
    /// Scan order for dispatch passes.
    pub const ALL: [Target; 4] = [Target::Ticket, Target::Note, Target::Task, Target::Journal];

    /// Stable identifier, also the storage-key prefix.
    pub fn id(&self) -> &'static str {
        match self {
            Target::Ticket => "ticket",
            Target::Note => "note",
            Target::Task => "task",
            Target::Journal => "journal",
        }
    }

    /// Parse a stable identifier back into a target. Unknown ids are
    /// rejected; the destination set is closed.
    pub fn from_id(id: &str) -> Option<Target> {
        Target::ALL.into_iter().find(|target| target.id() == id)
    }

    /// Look a target up by the URL scheme its app registers.
    pub fn from_scheme(scheme: &str) -> Option<Target> {
        Target::ALL.into_iter().find(|target| target.url_scheme() == scheme)
    }

    /// Path segment distinguishing the action inside the destination app,
    /// used as the host of the activation URL.
    pub fn action_path(&self) -> &'static str {
        match self {
            Target::Ticket => "create-ticket",
            Target::Note => "add-note",
            Target::Task => "add-task",
            Target::Journal => "new-entry",
        }
    }

    /// URL scheme registered by the destination app.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Target::Ticket => "tickhq",
            Target::Note => "quicknote",
            Target::Task => "taskbox",
            Target::Journal => "daybook",
        }
    }

    /// Executable name of the destination app in the process table.
    pub fn process_name(&self) -> &'static str {
        match self {
            Target::Ticket => "tickhq",
            Target::Note => "quicknote",
            Target::Task => "taskbox",
            Target::Journal => "daybook",
        }
    }

    /// Human-readable app name, consumed by UI/CLI surfaces only.
    pub fn display_name(&self) -> &'static str {
        match self {
            Target::Ticket => "TickHQ",
            Target::Note => "QuickNote",
            Target::Task => "TaskBox",
            Target::Journal => "DayBook",
        }
    }

    /// Label for the action the destination performs with the payload.
    pub fn action_label(&self) -> &'static str {
        match self {
            Target::Ticket => "Create ticket",
            Target::Note => "Add note",
            Target::Task => "Add task",
            Target::Journal => "New entry",
        }
    }

    /// URL that activates the destination with enough information to fetch
    /// its record from the shared store.
    pub fn activation_url(&self, request_id: Uuid) -> String {
        format!(
            "{}://{}?source=share&id={}",
            self.url_scheme(),
            self.action_path(),
            request_id
        )
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_from_id() {
        for target in Target::ALL {
            assert_eq!(Target::from_id(target.id()), Some(target));
        }
        assert_eq!(Target::from_id("clipboard"), None);
    }

    #[test]
    fn serde_form_matches_stable_id() {
        for target in Target::ALL {
            let json = serde_json::to_string(&target).unwrap();
            assert_eq!(json, format!("\"{}\"", target.id()));
        }
    }

    #[test]
    fn activation_url_embeds_scheme_action_and_id() {
        let id = Uuid::new_v4();
        let url = Target::Ticket.activation_url(id);
        assert_eq!(url, format!("tickhq://create-ticket?source=share&id={id}"));
    }
}
