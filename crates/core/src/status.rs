//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` database table, and the string form
//! matches the `name` column.

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Look up a variant by its database status ID.
            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( $val => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Lowercase name as stored in the lookup table.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $label, )+
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Lifecycle of a generation request as seen by polling clients.
    GenerationStatus {
        Queued = 1 => "queued",
        Processing = 2 => "processing",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
    }
}

define_status_enum! {
    /// Lifecycle of an entry in the generation work queue.
    QueueState {
        Ready = 1 => "ready",
        Leased = 2 => "leased",
        Done = 3 => "done",
        Dead = 4 => "dead",
    }
}

impl GenerationStatus {
    /// `completed` and `failed` never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Forward-only state machine: `queued -> processing -> {completed | failed}`.
    ///
    /// `processing -> processing` is allowed so that a job whose lease
    /// expired can be re-claimed. `queued -> failed` covers jobs that could
    /// not be enqueued or carried an unreadable payload.
    pub fn can_transition_to(self, next: GenerationStatus) -> bool {
        use GenerationStatus::*;
        matches!(
            (self, next),
            (Queued, Processing)
                | (Processing, Processing)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Queued, Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_status_ids_match_seed_data() {
        assert_eq!(GenerationStatus::Queued.id(), 1);
        assert_eq!(GenerationStatus::Processing.id(), 2);
        assert_eq!(GenerationStatus::Completed.id(), 3);
        assert_eq!(GenerationStatus::Failed.id(), 4);
    }

    #[test]
    fn queue_state_ids_match_seed_data() {
        assert_eq!(QueueState::Ready.id(), 1);
        assert_eq!(QueueState::Leased.id(), 2);
        assert_eq!(QueueState::Done.id(), 3);
        assert_eq!(QueueState::Dead.id(), 4);
    }

    #[test]
    fn from_id_round_trips_and_rejects_unknown() {
        assert_eq!(GenerationStatus::from_id(3), Some(GenerationStatus::Completed));
        assert_eq!(GenerationStatus::from_id(0), None);
        assert_eq!(QueueState::from_id(9), None);
    }

    #[test]
    fn status_serializes_as_lowercase_name() {
        let json = serde_json::to_value(GenerationStatus::Processing).unwrap();
        assert_eq!(json, "processing");
        assert_eq!(GenerationStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn terminal_states_have_no_exits() {
        use GenerationStatus::*;
        for terminal in [Completed, Failed] {
            for next in [Queued, Processing, Completed, Failed] {
                assert!(!terminal.can_transition_to(next), "{terminal} -> {next}");
            }
        }
    }

    #[test]
    fn nothing_returns_to_queued() {
        use GenerationStatus::*;
        for from in [Queued, Processing, Completed, Failed] {
            assert!(!from.can_transition_to(Queued));
        }
    }

    #[test]
    fn happy_path_transitions_are_allowed() {
        use GenerationStatus::*;
        assert!(Queued.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(!Queued.can_transition_to(Completed));
    }
}
