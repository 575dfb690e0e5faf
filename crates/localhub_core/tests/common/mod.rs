#![allow(dead_code)]

use localhub_core::model::notification::Notification;
use localhub_core::notifications::{MemoryEmailOutbox, MemoryPushOutbox};
use localhub_core::repo::community_repo::{CommunityRepository, SqliteCommunityRepository};
use localhub_core::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use localhub_core::repo::user_repo::{SqliteUserRepository, UserRepository};
use localhub_core::service::CommunityService;
use localhub_core::{open_db_in_memory, AdapterRegistry, Community, Dispatcher, Membership, Role, Settings, User};
use rusqlite::Connection;
use std::sync::Arc;
use uuid::Uuid;

/// One community with an admin, backed by an in-memory database.
pub struct Fixture {
    pub conn: Connection,
    pub dispatcher: Dispatcher,
    pub email: Arc<MemoryEmailOutbox>,
    pub push: Arc<MemoryPushOutbox>,
    pub community: Community,
    pub admin: User,
}

impl Fixture {
    pub fn new() -> Self {
        let conn = open_db_in_memory().unwrap();
        let email = Arc::new(MemoryEmailOutbox::new());
        let push = Arc::new(MemoryPushOutbox::new());
        let dispatcher = Dispatcher::new(
            AdapterRegistry::with_defaults(),
            email.clone(),
            push.clone(),
            Settings::default().push,
        );

        let admin = create_user(&conn, "admin");
        let community = CommunityService::new(&conn, &dispatcher)
            .create_community(admin.id, Community::new("demo.localhub.social", "Demo"))
            .unwrap();

        Self {
            conn,
            dispatcher,
            email,
            push,
            community,
            admin,
        }
    }

    /// Registers `username` and adds them to the community with `role`.
    pub fn member(&self, username: &str, role: Role) -> User {
        let user = create_user(&self.conn, username);
        SqliteCommunityRepository::new(&self.conn)
            .add_membership(&Membership::new(user.id, self.community.id, role))
            .unwrap();
        user
    }

    /// Registers `username` without any membership.
    pub fn outsider(&self, username: &str) -> User {
        create_user(&self.conn, username)
    }

    pub fn notifications_for(&self, user: Uuid) -> Vec<Notification> {
        SqliteNotificationRepository::new(&self.conn)
            .notifications_for(user, self.community.id, false)
            .unwrap()
    }

    pub fn user(&self, id: Uuid) -> User {
        SqliteUserRepository::new(&self.conn)
            .get_user(id)
            .unwrap()
            .unwrap()
    }

    pub fn save_user(&self, user: &User) {
        SqliteUserRepository::new(&self.conn)
            .update_user(user)
            .unwrap();
    }
}

pub fn create_user(conn: &Connection, username: &str) -> User {
    let user = User::new(username, format!("{username}@example.com"));
    SqliteUserRepository::new(conn).create_user(&user).unwrap();
    user
}
