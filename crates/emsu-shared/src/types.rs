//! String-backed enums persisted as TEXT columns and exchanged as lowercase
//! JSON strings.

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err($crate::error::ParseEnumError {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use string_enum;

string_enum! {
    /// Account role. Fixed at registration.
    Role {
        Student => "student",
        Teacher => "teacher",
        Parent => "parent",
        Principal => "principal",
        Proprietor => "proprietor",
    }
}

impl Role {
    /// Principals and proprietors run a school.
    pub fn is_leadership(&self) -> bool {
        matches!(self, Role::Principal | Role::Proprietor)
    }
}

string_enum! {
    Term {
        First => "first",
        Second => "second",
        Third => "third",
    }
}

string_enum! {
    GradeStatus {
        Draft => "draft",
        Published => "published",
    }
}

impl Default for GradeStatus {
    fn default() -> Self {
        Self::Draft
    }
}

string_enum! {
    AttendanceStatus {
        Present => "present",
        Absent => "absent",
        Late => "late",
    }
}

string_enum! {
    AnnouncementPriority {
        Low => "low",
        Normal => "normal",
        High => "high",
    }
}

impl Default for AnnouncementPriority {
    fn default() -> Self {
        Self::Normal
    }
}

string_enum! {
    NotificationPriority {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

impl Default for NotificationPriority {
    fn default() -> Self {
        Self::Medium
    }
}

string_enum! {
    ChatRoomType {
        Direct => "direct",
        Class => "class",
        School => "school",
        General => "general",
    }
}

string_enum! {
    /// Standing of a user inside a chat room.
    MemberRole {
        Admin => "admin",
        Moderator => "moderator",
        Member => "member",
    }
}

impl Default for MemberRole {
    fn default() -> Self {
        Self::Member
    }
}

string_enum! {
    MessageType {
        Text => "text",
        File => "file",
        Image => "image",
    }
}

impl Default for MessageType {
    fn default() -> Self {
        Self::Text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parses_every_variant() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), *role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        let err = "janitor".parse::<Role>().unwrap_err();
        assert_eq!(err.kind, "Role");
        assert_eq!(err.value, "janitor");
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ChatRoomType::General).unwrap();
        assert_eq!(json, "\"general\"");
        let term: Term = serde_json::from_str("\"third\"").unwrap();
        assert_eq!(term, Term::Third);
    }

    #[test]
    fn leadership_roles() {
        assert!(Role::Principal.is_leadership());
        assert!(Role::Proprietor.is_leadership());
        assert!(!Role::Teacher.is_leadership());
        assert!(!Role::Parent.is_leadership());
    }
}
