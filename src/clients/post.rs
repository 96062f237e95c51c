use crate::error::Result;
use crate::models::{Post, PostQuery, Provenance};
use crate::session::SessionManager;
use crate::transport::{segment, Request};
use serde_json::json;
use std::sync::Arc;

/// Local posts. Everything returned here is tagged `Provenance::Local`.
#[derive(Clone)]
pub struct PostClient {
    session: Arc<SessionManager>,
}

impl PostClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub async fn list(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let request = Request::get("/posts").query(query.pairs());
        let posts: Vec<Post> = self.session.send(request).await?.decode()?;
        log::debug!("[posts] fetched {} local posts", posts.len());
        Ok(posts.into_iter().map(local).collect())
    }

    pub async fn get(&self, post_id: &str) -> Result<Post> {
        let path = format!("/posts/{}", segment(post_id));
        let post: Post = self.session.send(Request::get(path)).await?.decode()?;
        Ok(local(post))
    }

    pub async fn create(&self, content: &str) -> Result<Post> {
        let request = Request::post("/posts").json(&json!({ "content": content }))?;
        let post: Post = self.session.send(request).await?.decode()?;
        Ok(local(post))
    }

    pub async fn delete(&self, post_id: &str) -> Result<()> {
        let path = format!("/posts/{}", segment(post_id));
        self.session.send(Request::delete(path)).await?;
        Ok(())
    }

    pub async fn like(&self, post_id: &str) -> Result<()> {
        let path = format!("/posts/{}/like", segment(post_id));
        self.session.send(Request::post(path)).await?;
        Ok(())
    }

    pub async fn unlike(&self, post_id: &str) -> Result<()> {
        let path = format!("/posts/{}/like", segment(post_id));
        self.session.send(Request::delete(path)).await?;
        Ok(())
    }

    /// The server assigns id and timestamp; callers refetch the post rather
    /// than reading the comment back.
    pub async fn add_comment(&self, post_id: &str, content: &str) -> Result<()> {
        let path = format!("/posts/{}/comments", segment(post_id));
        let request = Request::post(path).json(&json!({ "content": content }))?;
        self.session.send(request).await?;
        Ok(())
    }

    pub async fn delete_comment(&self, post_id: &str, comment_id: &str) -> Result<()> {
        let path = format!(
            "/posts/{}/comments/{}",
            segment(post_id),
            segment(comment_id)
        );
        self.session.send(Request::delete(path)).await?;
        Ok(())
    }
}

fn local(post: Post) -> Post {
    post.with_provenance(Provenance::Local)
}
