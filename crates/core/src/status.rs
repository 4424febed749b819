//! Status and kind enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding `*_statuses` / `*_kinds` table, and its name is the
//! lowercase snake_case label used on the wire and in audit snapshots.

use crate::error::CoreError;

/// Status ID type matching SMALLINT in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Every variant in discriminant order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            const NAMES: &'static [&'static str] = &[$($label),+];

            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Return the wire name.
            pub fn name(self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }

            pub fn from_id(id: StatusId) -> Option<Self> {
                Self::ALL.iter().copied().find(|s| s.id() == id)
            }

            pub fn from_name(name: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|s| s.name() == name)
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }

        impl TryFrom<StatusId> for $name {
            type Error = CoreError;

            fn try_from(id: StatusId) -> Result<Self, Self::Error> {
                Self::from_id(id).ok_or_else(|| {
                    CoreError::Internal(format!(
                        "unknown {} id {id}",
                        stringify!($name)
                    ))
                })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.name())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = <String as serde::Deserialize>::deserialize(deserializer)?;
                Self::from_name(&raw)
                    .ok_or_else(|| serde::de::Error::unknown_variant(&raw, Self::NAMES))
            }
        }
    };
}

define_status_enum! {
    /// Funding call (edital) lifecycle status.
    CallStatus {
        Draft = 1 => "draft",
        Published = 2 => "published",
        Ongoing = 3 => "ongoing",
        Finished = 4 => "finished",
        Cancelled = 5 => "cancelled",
    }
}

define_status_enum! {
    /// Applicant (proponente) account status.
    ApplicantStatus {
        Active = 1 => "active",
        Inactive = 2 => "inactive",
        Blocked = 3 => "blocked",
    }
}

define_status_enum! {
    /// Applicant legal nature. Decides which tax id checksum applies.
    LegalKind {
        Individual = 1 => "individual",
        Organization = 2 => "organization",
    }
}

define_status_enum! {
    /// Project lifecycle status.
    ProjectStatus {
        Draft = 1 => "draft",
        Submitted = 2 => "submitted",
        UnderReview = 3 => "under_review",
        Approved = 4 => "approved",
        Rejected = 5 => "rejected",
        InExecution = 6 => "in_execution",
        Finished = 7 => "finished",
        Cancelled = 8 => "cancelled",
    }
}

define_status_enum! {
    /// Contract lifecycle status.
    ContractStatus {
        Draft = 1 => "draft",
        Sent = 2 => "sent",
        Signed = 3 => "signed",
        Active = 4 => "active",
        Expired = 5 => "expired",
        Terminated = 6 => "terminated",
    }
}

define_status_enum! {
    /// What a contract covers.
    ContractKind {
        Execution = 1 => "execution",
        Accountability = 2 => "accountability",
        Amendment = 3 => "amendment",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn ids_match_seed_order() {
        assert_eq!(CallStatus::Draft.id(), 1);
        assert_eq!(CallStatus::Cancelled.id(), 5);
        assert_eq!(ProjectStatus::InExecution.id(), 6);
        assert_eq!(ContractStatus::Terminated.id(), 6);
        assert_eq!(ContractKind::Amendment.id(), 3);
    }

    #[test]
    fn id_and_name_lookups_agree() {
        for status in ProjectStatus::ALL {
            assert_eq!(ProjectStatus::from_id(status.id()), Some(*status));
            assert_eq!(ProjectStatus::from_name(status.name()), Some(*status));
        }
        assert_eq!(ProjectStatus::from_id(99), None);
    }

    #[test]
    fn unknown_id_is_internal_error() {
        assert_matches!(ContractStatus::try_from(42_i16), Err(CoreError::Internal(_)));
    }

    #[test]
    fn serde_uses_snake_case_names() {
        let json = serde_json::to_string(&ProjectStatus::UnderReview).unwrap();
        assert_eq!(json, "\"under_review\"");

        let parsed: ContractStatus = serde_json::from_str("\"signed\"").unwrap();
        assert_eq!(parsed, ContractStatus::Signed);

        assert!(serde_json::from_str::<CallStatus>("\"archived\"").is_err());
    }
}
