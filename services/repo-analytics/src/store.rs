//! Storage for the demo team/task/event endpoints
//!
//! The HTTP layer only talks to the [`Store`] trait. [`InMemoryStore`] keeps
//! everything in process memory and forgets it on restart.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

/// Free-form JSON object as posted by the dashboard (tasks, events).
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub leader: Option<String>,
    #[serde(default)]
    pub repo_url: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTeam {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub leader: Option<String>,
    #[serde(default)]
    pub repo_url: Option<String>,
}

pub trait Store: Send + Sync {
    fn list_teams(&self) -> Vec<Team>;
    fn get_team(&self, id: &str) -> Option<Team>;
    fn create_team(&self, team: NewTeam) -> Team;

    fn list_tasks(&self, team_id: Option<&str>) -> Vec<Document>;
    fn create_task(&self, task: Document) -> Document;
    /// Merge `update` into the task with `id`, returning the merged task.
    fn update_task(&self, id: &str, update: Document) -> Option<Document>;

    fn list_events(&self, team_id: Option<&str>) -> Vec<Document>;
    fn create_event(&self, event: Document) -> Document;
}

#[derive(Debug, Default)]
struct Tables {
    teams: BTreeMap<String, Team>,
    tasks: Vec<Document>,
    events: Vec<Document>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Store seeded with the three demo teams the dashboard expects.
    pub fn with_demo_teams() -> Self {
        let seed = [
            ("1", "Team Quantum", ["Alice Chen", "Bob Smith", "Charlie Brown"], "https://github.com/team/quantum", "2024-01-15T10:00:00Z"),
            ("2", "Team Nebula", ["Diana Prince", "Eve Torres", "Frank Castle"], "https://github.com/team/nebula", "2024-01-20T14:30:00Z"),
            ("3", "Team Phoenix", ["Grace Hopper", "Henry Ford", "Ivy Chen"], "https://github.com/team/phoenix", "2024-02-01T09:15:00Z"),
        ];

        let mut tables = Tables::default();
        for (id, name, members, repo_url, created_at) in seed {
            tables.teams.insert(
                id.to_string(),
                Team {
                    id: id.to_string(),
                    name: name.to_string(),
                    members: members.iter().map(|m| m.to_string()).collect(),
                    leader: Some(members[0].to_string()),
                    repo_url: Some(repo_url.to_string()),
                    created_at: created_at.to_string(),
                },
            );
        }
        Self { tables: RwLock::new(tables) }
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> T) -> T {
        let guard = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let mut guard = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn belongs_to(doc: &Document, team_id: Option<&str>) -> bool {
    match team_id {
        None => true,
        Some(team_id) => doc.get("team_id").and_then(Value::as_str) == Some(team_id),
    }
}

impl Store for InMemoryStore {
    fn list_teams(&self) -> Vec<Team> {
        self.read(|t| t.teams.values().cloned().collect())
    }

    fn get_team(&self, id: &str) -> Option<Team> {
        self.read(|t| t.teams.get(id).cloned())
    }

    fn create_team(&self, team: NewTeam) -> Team {
        self.write(|t| {
            let id = format!("team_{}", t.teams.len() + 1);
            let team = Team {
                id: id.clone(),
                name: team.name,
                members: team.members,
                leader: team.leader,
                repo_url: team.repo_url,
                created_at: now_iso(),
            };
            t.teams.insert(id, team.clone());
            team
        })
    }

    fn list_tasks(&self, team_id: Option<&str>) -> Vec<Document> {
        self.read(|t| t.tasks.iter().filter(|d| belongs_to(d, team_id)).cloned().collect())
    }

    fn create_task(&self, mut task: Document) -> Document {
        self.write(|t| {
            task.insert("id".to_string(), Value::String(format!("task_{}", t.tasks.len() + 1)));
            task.insert("created_at".to_string(), Value::String(now_iso()));
            t.tasks.push(task.clone());
            task
        })
    }

    fn update_task(&self, id: &str, update: Document) -> Option<Document> {
        self.write(|t| {
            let task = t
                .tasks
                .iter_mut()
                .find(|d| d.get("id").and_then(Value::as_str) == Some(id))?;
            task.extend(update);
            Some(task.clone())
        })
    }

    fn list_events(&self, team_id: Option<&str>) -> Vec<Document> {
        self.read(|t| t.events.iter().filter(|d| belongs_to(d, team_id)).cloned().collect())
    }

    fn create_event(&self, mut event: Document) -> Document {
        self.write(|t| {
            event.insert("id".to_string(), Value::String(format!("event_{}", t.events.len() + 1)));
            t.events.push(event.clone());
            event
        })
    }
}
