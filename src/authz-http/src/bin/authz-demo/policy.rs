//! Demo policies
//!
//! `ArticlePolicy` and `ArticlesPolicy` are found by convention,
//! `RequestPolicy` is mapped explicitly to `RequestTarget`.

use crate::model::entity::Article;
use crate::model::table::ArticlesQuery;
use bastion_authz::{Conditions, Identity, Policy, PolicyResult, Query, Rules};
use bastion_authz_http::RequestTarget;
use serde_json::{json, Value};

fn role(identity: Option<&Identity>) -> Option<String> {
    identity.and_then(|user| user.get_str("role"))
}

fn is_author(identity: Option<&Identity>, article: &Article) -> bool {
    identity.and_then(|user| user.get("id")) == Some(json!(article.author_id))
}

#[derive(Default)]
pub struct ArticlePolicy;

impl ArticlePolicy {
    fn can_view(&self, identity: Option<&Identity>, article: &Article) -> bool {
        article.published || is_author(identity, article)
    }

    fn can_add(&self, identity: Option<&Identity>, _article: &Article) -> PolicyResult {
        match role(identity).as_deref() {
            Some("admin") | Some("author") => PolicyResult::allow(),
            Some(_) => PolicyResult::deny_with("only authors can write articles"),
            None => PolicyResult::deny_with("sign in to write articles"),
        }
    }

    fn can_publish(&self, identity: Option<&Identity>, article: &Article) -> PolicyResult {
        if role(identity).as_deref() == Some("admin") || is_author(identity, article) {
            PolicyResult::allow()
        } else {
            PolicyResult::deny_with("not the author")
        }
    }
}

impl Policy for ArticlePolicy {
    fn rules(rules: &mut Rules<Self>) {
        rules
            .can("view", Self::can_view)
            .can("add", Self::can_add)
            .can("publish", Self::can_publish);
    }
}

#[derive(Default)]
pub struct ArticlesPolicy;

impl Policy for ArticlesPolicy {
    fn rules(rules: &mut Rules<Self>) {
        rules.scope("index", |_: &Self, identity: Option<&Identity>, mut query: ArticlesQuery| {
            if role(identity).as_deref() != Some("admin") {
                let mut conditions = Conditions::new();
                conditions.insert("published".to_string(), Value::Bool(true));
                query.and_where(conditions);
            }
            query
        });
    }
}

/// Request-level policy for the admin area
#[derive(Default)]
pub struct RequestPolicy;

impl Policy for RequestPolicy {
    fn rules(rules: &mut Rules<Self>) {
        rules.can("access", |_: &Self, identity: Option<&Identity>, target: &RequestTarget| {
            if !target.path.starts_with("/admin") || role(identity).as_deref() == Some("admin") {
                PolicyResult::allow()
            } else {
                PolicyResult::deny_with("admins only")
            }
        });
    }
}
