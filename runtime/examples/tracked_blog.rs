//! Minimal tracked CRUD service
//!
//! ```sh
//! cargo run --example tracked_blog
//! curl localhost:8080/blogs
//! curl -X POST localhost:8080/blogs -d '{"title":"hello"}'
//! curl localhost:8080/blogs/0
//! curl localhost:8080/metrics | grep jalki
//! ```
//!
//! Every request prints an audit line via the default stdout sink.

use jalki_runtime::prelude::*;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct BlogStore {
    posts: Mutex<Vec<String>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let store = Arc::new(BlogStore::default());

    jalki_runtime::run(|app| async move {
        let list_store = Arc::clone(&store);
        let create_store = Arc::clone(&store);
        let fetch_store = Arc::clone(&store);

        let collection = HandlerSet::new()
            .get(handler_fn(move |_req, _ctx| {
                let store = Arc::clone(&list_store);
                async move {
                    let posts = store
                        .posts
                        .lock()
                        .map_err(|_| HandlerError::Internal("store poisoned".into()))?;
                    Response::json(&*posts)
                }
            }))
            .post(handler_fn(move |req: Request, _ctx| {
                let store = Arc::clone(&create_store);
                async move {
                    let body = req
                        .body_str()
                        .ok_or_else(|| HandlerError::Invalid("body must be UTF-8".into()))?
                        .to_string();
                    let mut posts = store
                        .posts
                        .lock()
                        .map_err(|_| HandlerError::Internal("store poisoned".into()))?;
                    posts.push(body);
                    Ok(Response::created(format!("{}", posts.len() - 1)))
                }
            }));

        let item = HandlerSet::new().get(handler_fn(move |_req, ctx: RequestContext| {
            let store = Arc::clone(&fetch_store);
            async move {
                let id: usize = ctx
                    .params
                    .record_id()
                    .ok_or_else(|| HandlerError::Invalid("missing id".into()))?
                    .parse()
                    .map_err(|_| HandlerError::Invalid("id must be a number".into()))?;

                let posts = store
                    .posts
                    .lock()
                    .map_err(|_| HandlerError::Internal("store poisoned".into()))?;
                match posts.get(id) {
                    Some(post) => Ok(Response::ok(post.clone())),
                    None => Err(HandlerError::NotFound {
                        entity: "Blog".into(),
                        id: id.to_string(),
                    }),
                }
            }
        }));

        Ok(app
            .route("/blogs", collection, TrackingConfig::entity("Blog"))
            .route("/blogs/{id}", item, TrackingConfig::entity("Blog")))
    })
    .await
}
