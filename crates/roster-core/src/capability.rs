//! Capability names checked against the host platform's permission system.

/// Required to open the directory at all.
pub const VIEW_PARTICIPANTS: &str = "course:viewparticipants";

/// Lifts hidden profile fields and mail-display preferences.
pub const VIEW_HIDDEN_USER_FIELDS: &str = "course:viewhiddenuserfields";

/// Lets a viewer browse every group of a separate-groups course.
pub const ACCESS_ALL_GROUPS: &str = "site:accessallgroups";
