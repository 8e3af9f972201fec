//! Demo data model, laid out the way the convention resolver expects.

pub mod entity {
    use bastion_authz::Resource;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Article {
        pub id: u64,
        pub author_id: u64,
        pub title: String,
        pub published: bool,
    }

    impl Resource for Article {}
}

pub mod table {
    use super::entity::Article;
    use bastion_authz::{Conditions, Query, Resource, ResourceRole};

    #[derive(Debug, Default, Clone)]
    pub struct ArticlesTable;

    impl Resource for ArticlesTable {
        fn role(&self) -> ResourceRole {
            ResourceRole::Repository
        }
    }

    /// Filter over the article store
    #[derive(Debug, Default)]
    pub struct ArticlesQuery {
        table: ArticlesTable,
        conditions: Conditions,
    }

    impl ArticlesQuery {
        pub fn new() -> Self {
            Self::default()
        }

        /// An article matches when every condition equals its field value.
        pub fn matches(&self, article: &Article) -> bool {
            serde_json::to_value(article)
                .map(|value| {
                    self.conditions
                        .iter()
                        .all(|(field, expected)| value.get(field) == Some(expected))
                })
                .unwrap_or(false)
        }
    }

    impl Resource for ArticlesQuery {
        fn as_query(&self) -> Option<&dyn Query> {
            Some(self)
        }
    }

    impl Query for ArticlesQuery {
        fn repository(&self) -> &dyn Resource {
            &self.table
        }

        fn and_where(&mut self, conditions: Conditions) {
            self.conditions.extend(conditions);
        }
    }
}
