//! Script catalog
//!
//! Every script is a flat list of independent commands. Script contents are
//! literal: identifiers, filters and index options are exactly what gets sent.

use bson::{doc, Bson, DateTime};
use serde::Serialize;

use crate::command::Command;
use crate::index::{exists_filter, non_empty_strings_filter, CollationSpec, IndexSpec};
use crate::Result;
use curator_common::CuratorError;

pub const USERS_COLLECTION: &str = "users";
pub const RATINGS_COLLECTION: &str = "ratings";
pub const COMMENTS_COLLECTION: &str = "comments";
pub const TITLES_COLLECTION: &str = "titles";
pub const GROUPS_COLLECTION: &str = "groups";

/// A named, fixed list of commands
#[derive(Debug, Clone)]
pub struct Script {
    pub name: &'static str,
    pub description: &'static str,
    pub commands: Vec<Command>,
}

/// Catalog entry; `build` produces the commands on demand so timestamps are
/// taken when the script runs
pub struct ScriptEntry {
    pub name: &'static str,
    pub description: &'static str,
    build: fn() -> Result<Vec<Command>>,
}

impl ScriptEntry {
    pub fn build(&self) -> Result<Script> {
        Ok(Script {
            name: self.name,
            description: self.description,
            commands: (self.build)()?,
        })
    }
}

pub const CATALOG: &[ScriptEntry] = &[
    ScriptEntry {
        name: "migrations",
        description: "Unique indexes on users (email, username; case-insensitive), \
                      ratings and comments",
        build: migrations,
    },
    ScriptEntry {
        name: "seed-users",
        description: "Insert the two initial users",
        build: seed_users,
    },
    ScriptEntry {
        name: "titles-watched",
        description: "Add watched=false to every title",
        build: titles_watched,
    },
    ScriptEntry {
        name: "titles-timestamps",
        description: "Delete title tt0117060 and add addedAt/updatedAt/watchedAt to every title",
        build: titles_timestamps,
    },
    ScriptEntry {
        name: "app-indexes",
        description: "Named unique indexes used by the application (users, comments, groups)",
        build: app_index_commands,
    },
    ScriptEntry {
        name: "season-backfill",
        description: "Set season=0 on ratings and comments that have no season",
        build: season_backfill,
    },
];

/// Look a script up by name and build it
pub fn script(name: &str) -> Result<Script> {
    CATALOG
        .iter()
        .find(|entry| entry.name == name)
        .ok_or_else(|| {
            let known = CATALOG.iter().map(|e| e.name).collect::<Vec<_>>().join(", ");
            CuratorError::Validation(format!("Unknown script '{}' (known: {})", name, known))
        })?
        .build()
}

/// Case-insensitive unique index on a user field, applied only where the field exists
fn case_insensitive_unique(field: &str) -> IndexSpec {
    IndexSpec::new(doc! { field: 1 })
        .unique(true)
        .collation(CollationSpec::case_insensitive_en())
        .partial_filter(exists_filter(field))
}

fn user_title_unique() -> IndexSpec {
    IndexSpec::new(doc! { "userId": 1, "titleId": 1 }).unique(true)
}

fn migrations() -> Result<Vec<Command>> {
    Ok(vec![
        Command::create_index(USERS_COLLECTION, case_insensitive_unique("email")),
        Command::create_index(USERS_COLLECTION, case_insensitive_unique("username")),
        Command::create_index(RATINGS_COLLECTION, user_title_unique()),
        Command::create_index(COMMENTS_COLLECTION, user_title_unique()),
    ])
}

#[derive(Debug, Serialize)]
struct SeedUser<'a> {
    #[serde(rename = "_id")]
    id: &'a str,
    name: &'a str,
}

pub const SEED_USERS: &[(&str, &str)] = &[
    ("68e67788956f936302a2a778", "Renan"),
    ("68e67788956f936302a2a779", "Bruna"),
];

fn seed_users() -> Result<Vec<Command>> {
    let documents = SEED_USERS
        .iter()
        .map(|&(id, name)| bson::to_document(&SeedUser { id, name }))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(vec![Command::insert_many(USERS_COLLECTION, documents)])
}

fn titles_watched() -> Result<Vec<Command>> {
    Ok(vec![Command::update_many(
        TITLES_COLLECTION,
        doc! {},
        doc! { "$set": { "watched": false } },
    )])
}

pub const REMOVED_TITLE_ID: &str = "tt0117060";

fn titles_timestamps() -> Result<Vec<Command>> {
    let now = DateTime::now();
    Ok(vec![
        Command::delete_by_id(TITLES_COLLECTION, REMOVED_TITLE_ID),
        Command::update_many(
            TITLES_COLLECTION,
            doc! {},
            doc! { "$set": { "addedAt": now, "updatedAt": now, "watchedAt": Bson::Null } },
        ),
    ])
}

/// The named indexes the application relies on, with the collection each belongs to
pub fn app_indexes() -> Vec<(&'static str, IndexSpec)> {
    let user_field = |field: &str, name: &str| {
        IndexSpec::new(doc! { field: 1 })
            .name(name)
            .unique(true)
            .collation(CollationSpec::case_insensitive_en())
            .partial_filter(non_empty_strings_filter(&[field]))
    };

    vec![
        (USERS_COLLECTION, user_field("email", "email_unique")),
        (USERS_COLLECTION, user_field("username", "username_unique")),
        (
            COMMENTS_COLLECTION,
            user_title_unique().name("userId_and_titleId_unique"),
        ),
        (
            GROUPS_COLLECTION,
            IndexSpec::new(doc! { "ownerId": 1, "name": 1 })
                .name("ownerId_and_name_unique")
                .unique(true)
                .partial_filter(non_empty_strings_filter(&["ownerId", "name"])),
        ),
    ]
}

fn app_index_commands() -> Result<Vec<Command>> {
    Ok(app_indexes()
        .into_iter()
        .map(|(collection, spec)| Command::create_index(collection, spec))
        .collect())
}

fn season_backfill() -> Result<Vec<Command>> {
    Ok([RATINGS_COLLECTION, COMMENTS_COLLECTION]
        .into_iter()
        .map(|collection| {
            Command::update_many(
                collection,
                doc! { "season": { "$exists": false } },
                doc! { "$set": { "season": 0 } },
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Operation;

    #[test]
    fn test_every_catalog_entry_builds() {
        for entry in CATALOG {
            let script = entry.build().unwrap();
            assert!(!script.commands.is_empty(), "{} has no commands", entry.name);
        }
    }

    #[test]
    fn test_unknown_script() {
        let err = script("drop-everything").unwrap_err();
        assert!(err.to_string().contains("migrations"));
    }

    #[test]
    fn test_seed_users_documents() {
        let script = script("seed-users").unwrap();
        let Operation::InsertMany { documents } = &script.commands[0].operation else {
            panic!("expected insert");
        };
        assert_eq!(
            documents,
            &vec![
                doc! { "_id": "68e67788956f936302a2a778", "name": "Renan" },
                doc! { "_id": "68e67788956f936302a2a779", "name": "Bruna" },
            ]
        );
    }

    #[test]
    fn test_timestamps_share_one_instant() {
        let script = script("titles-timestamps").unwrap();
        let Operation::UpdateMany { update, .. } = &script.commands[1].operation else {
            panic!("expected update");
        };
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get("addedAt"), set.get("updatedAt"));
        assert_eq!(set.get("watchedAt"), Some(&Bson::Null));
    }

    #[test]
    fn test_app_index_names() {
        let names: Vec<String> = app_indexes().iter().map(|(_, s)| s.resolved_name()).collect();
        assert_eq!(
            names,
            vec![
                "email_unique",
                "username_unique",
                "userId_and_titleId_unique",
                "ownerId_and_name_unique"
            ]
        );
    }
}
