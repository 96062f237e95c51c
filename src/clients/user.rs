use crate::error::Result;
use crate::models::{Author, Post, ProfileUpdate, Provenance, User};
use crate::session::SessionManager;
use crate::transport::{segment, Request};
use std::sync::Arc;

#[derive(Clone)]
pub struct UserClient {
    session: Arc<SessionManager>,
}

impl UserClient {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    pub async fn me(&self) -> Result<User> {
        self.session.send(Request::get("/users/me")).await?.decode()
    }

    pub async fn get(&self, user_id: &str) -> Result<User> {
        let path = format!("/users/{}", segment(user_id));
        self.session.send(Request::get(path)).await?.decode()
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        let request = Request::put("/users/profile").json(update)?;
        self.session.send(request).await?.decode()
    }

    pub async fn follow(&self, user_id: &str) -> Result<()> {
        let path = format!("/users/{}/follow", segment(user_id));
        self.session.send(Request::post(path)).await?;
        Ok(())
    }

    pub async fn unfollow(&self, user_id: &str) -> Result<()> {
        let path = format!("/users/{}/follow", segment(user_id));
        self.session.send(Request::delete(path)).await?;
        Ok(())
    }

    pub async fn followers(&self, user_id: &str) -> Result<Vec<Author>> {
        let path = format!("/users/{}/followers", segment(user_id));
        self.session.send(Request::get(path)).await?.decode()
    }

    pub async fn following(&self, user_id: &str) -> Result<Vec<Author>> {
        let path = format!("/users/{}/following", segment(user_id));
        self.session.send(Request::get(path)).await?.decode()
    }

    pub async fn search(&self, query: &str) -> Result<Vec<User>> {
        let request =
            Request::get("/users/search").query(vec![("q".to_string(), query.to_string())]);
        self.session.send(request).await?.decode()
    }

    /// Posts authored by one local user.
    pub async fn posts(&self, user_id: &str) -> Result<Vec<Post>> {
        let path = format!("/users/{}/posts", segment(user_id));
        let posts: Vec<Post> = self.session.send(Request::get(path)).await?.decode()?;
        Ok(posts
            .into_iter()
            .map(|p| p.with_provenance(Provenance::Local))
            .collect())
    }
}
