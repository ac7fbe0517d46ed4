//! Update queries: adds, deletes, commits, optimizes and rollbacks.

use std::any::Any;

use serde_json::{json, Map, Value};

use super::{downcast, Query, QueryType, RequestBuilder, ResponseParser};
use crate::document::Document;
use crate::result::QueryData;
use crate::types::{Params, Request, Response};
use crate::Error;

/// One command in an update request.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateCommand {
    Add {
        documents: Vec<Document>,
        overwrite: Option<bool>,
        commit_within: Option<u64>,
    },
    Delete {
        ids: Vec<String>,
        queries: Vec<String>,
    },
    Commit {
        soft_commit: Option<bool>,
        wait_searcher: Option<bool>,
        expunge_deletes: Option<bool>,
    },
    Optimize {
        wait_searcher: Option<bool>,
        max_segments: Option<u32>,
    },
    Rollback,
}

impl UpdateCommand {
    /// Append the `"name": {...}` members of this command.
    fn render(&self, out: &mut Vec<String>) {
        let mut member = |name: &str, value: Value| out.push(format!("{}:{}", json!(name), value));

        match self {
            UpdateCommand::Add {
                documents,
                overwrite,
                commit_within,
            } => {
                for document in documents {
                    let mut add = Map::new();
                    add.insert("doc".to_string(), document.clone().into_value());
                    if let Some(overwrite) = overwrite {
                        add.insert("overwrite".to_string(), json!(overwrite));
                    }
                    if let Some(commit_within) = commit_within {
                        add.insert("commitWithin".to_string(), json!(commit_within));
                    }
                    member("add", Value::Object(add));
                }
            }
            UpdateCommand::Delete { ids, queries } => {
                for id in ids {
                    member("delete", json!({ "id": id }));
                }
                for query in queries {
                    member("delete", json!({ "query": query }));
                }
            }
            UpdateCommand::Commit {
                soft_commit,
                wait_searcher,
                expunge_deletes,
            } => {
                let mut commit = Map::new();
                insert_flag(&mut commit, "softCommit", *soft_commit);
                insert_flag(&mut commit, "waitSearcher", *wait_searcher);
                insert_flag(&mut commit, "expungeDeletes", *expunge_deletes);
                member("commit", Value::Object(commit));
            }
            UpdateCommand::Optimize {
                wait_searcher,
                max_segments,
            } => {
                let mut optimize = Map::new();
                insert_flag(&mut optimize, "waitSearcher", *wait_searcher);
                if let Some(max_segments) = max_segments {
                    optimize.insert("maxSegments".to_string(), json!(max_segments));
                }
                member("optimize", Value::Object(optimize));
            }
            UpdateCommand::Rollback => member("rollback", json!({})),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            UpdateCommand::Add { documents, .. } => documents.is_empty(),
            UpdateCommand::Delete { ids, queries } => ids.is_empty() && queries.is_empty(),
            _ => false,
        }
    }
}

fn insert_flag(map: &mut Map<String, Value>, name: &str, value: Option<bool>) {
    if let Some(value) = value {
        map.insert(name.to_string(), Value::Bool(value));
    }
}

/// An ordered list of update commands sent as one request.
#[derive(Debug, Clone)]
pub struct UpdateQuery {
    handler: String,
    commands: Vec<UpdateCommand>,
    params: Params,
}

impl Default for UpdateQuery {
    fn default() -> Self {
        Self {
            handler: "update".to_string(),
            commands: Vec::new(),
            params: Params::new(),
        }
    }
}

impl UpdateQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = handler.into();
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.add(name, value);
        self
    }

    pub fn add_command(&mut self, command: UpdateCommand) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn add_document(&mut self, document: Document) -> &mut Self {
        self.add_documents(vec![document], None, None)
    }

    pub fn add_documents(
        &mut self,
        documents: Vec<Document>,
        overwrite: Option<bool>,
        commit_within: Option<u64>,
    ) -> &mut Self {
        self.add_command(UpdateCommand::Add {
            documents,
            overwrite,
            commit_within,
        })
    }

    pub fn add_delete_by_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.add_command(UpdateCommand::Delete {
            ids: vec![id.into()],
            queries: Vec::new(),
        })
    }

    pub fn add_delete_query(&mut self, query: impl Into<String>) -> &mut Self {
        self.add_command(UpdateCommand::Delete {
            ids: Vec::new(),
            queries: vec![query.into()],
        })
    }

    pub fn add_commit(
        &mut self,
        soft_commit: Option<bool>,
        wait_searcher: Option<bool>,
        expunge_deletes: Option<bool>,
    ) -> &mut Self {
        self.add_command(UpdateCommand::Commit {
            soft_commit,
            wait_searcher,
            expunge_deletes,
        })
    }

    pub fn add_optimize(
        &mut self,
        wait_searcher: Option<bool>,
        max_segments: Option<u32>,
    ) -> &mut Self {
        self.add_command(UpdateCommand::Optimize {
            wait_searcher,
            max_segments,
        })
    }

    pub fn add_rollback(&mut self) -> &mut Self {
        self.add_command(UpdateCommand::Rollback)
    }

    pub fn commands(&self) -> &[UpdateCommand] {
        &self.commands
    }

    /// The JSON command body; keys repeat so that command order survives.
    pub fn body(&self) -> Result<String, Error> {
        if self.commands.iter().all(UpdateCommand::is_empty) {
            return Err(Error::invalid_argument(
                "an update query needs at least one non-empty command",
            ));
        }
        let mut members = Vec::new();
        for command in &self.commands {
            command.render(&mut members);
        }
        Ok(format!("{{{}}}", members.join(",")))
    }
}

impl Query for UpdateQuery {
    fn query_type(&self) -> QueryType {
        QueryType::Update
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct UpdateRequestBuilder;

impl RequestBuilder for UpdateRequestBuilder {
    fn build(&self, query: &dyn Query) -> Result<Request, Error> {
        let update = downcast::<UpdateQuery>(query)?;
        let mut request =
            Request::post(update.handler.as_str()).with_body(update.body()?, "application/json");
        request.params.extend(&update.params);
        request.params.set("wt", "json");
        Ok(request)
    }
}

pub struct UpdateResponseParser;

impl ResponseParser for UpdateResponseParser {
    fn parse(&self, _query: &dyn Query, _response: &Response) -> Result<QueryData, Error> {
        Ok(QueryData::Update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_preserves_command_order() {
        let mut update = UpdateQuery::new();
        update
            .add_document(Document::new().with_field("id", "1"))
            .add_delete_by_id("1")
            .add_documents(
                vec![Document::new().with_field("id", "1")],
                Some(false),
                Some(500),
            )
            .add_commit(None, Some(true), None);

        assert_eq!(
            update.body().unwrap(),
            r#"{"add":{"doc":{"id":"1"}},"delete":{"id":"1"},"add":{"commitWithin":500,"doc":{"id":"1"},"overwrite":false},"commit":{"waitSearcher":true}}"#
        );
    }

    #[test]
    fn delete_by_query_and_rollback() {
        let mut update = UpdateQuery::new();
        update.add_delete_query("type:old").add_rollback();
        assert_eq!(
            update.body().unwrap(),
            r#"{"delete":{"query":"type:old"},"rollback":{}}"#
        );
    }

    #[test]
    fn empty_update_is_rejected() {
        let mut update = UpdateQuery::new();
        update.add_documents(Vec::new(), None, None);
        assert!(matches!(
            UpdateRequestBuilder.build(&update),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn request_is_a_json_post() {
        let mut update = UpdateQuery::new();
        update.add_optimize(Some(false), Some(1));
        let request = UpdateRequestBuilder.build(&update).unwrap();

        assert_eq!(request.method, crate::types::Method::POST);
        assert_eq!(request.handler, "update");
        assert_eq!(request.params.get("wt"), Some("json"));
        assert_eq!(
            request.body.as_deref(),
            Some(r#"{"optimize":{"maxSegments":1,"waitSearcher":false}}"#)
        );
    }
}
