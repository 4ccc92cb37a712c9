//! Persistence seams. Handlers and the search service only see these traits; the
//! Postgres/PostGIS backend serves production and the in-memory backend serves local
//! development and the test suite.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::geo::GeoPoint;
use crate::models::{
    ChatMessage, ConversationSummary, NearbyPharmacy, NewChatMessage, NewPharmacy, NewUser, Pharmacy, PharmacyPatch,
    Role, Storefront, User, UserPatch,
};
use crate::AppResult;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait PharmacyStore: Send + Sync {
    /// Persists a new pharmacy. The owner must be an existing pharmacy-role account.
    async fn create_pharmacy(&self, new: NewPharmacy) -> AppResult<Pharmacy>;

    async fn get_pharmacy(&self, id: Uuid) -> AppResult<Pharmacy>;

    async fn update_pharmacy(&self, id: Uuid, patch: PharmacyPatch) -> AppResult<Pharmacy>;

    async fn delete_pharmacy(&self, id: Uuid) -> AppResult<()>;

    /// Pharmacies within `max_distance_meters` of `point`, nearest first. Equal distances are
    /// ordered by id so repeated calls return identical sequences.
    async fn find_near(&self, point: GeoPoint, max_distance_meters: f64) -> AppResult<Vec<NearbyPharmacy>>;

    async fn list_pharmacies_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Pharmacy>>;

    async fn list_pharmacies(&self) -> AppResult<Vec<Pharmacy>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates an account. A storefront creates the owner's pharmacy in the same write.
    async fn create_user(&self, user: NewUser, storefront: Option<Storefront>) -> AppResult<(User, Option<Pharmacy>)>;

    async fn get_user(&self, id: Uuid) -> AppResult<User>;

    /// `email` must already be normalized.
    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>>;

    async fn list_users(&self, role: Option<Role>) -> AppResult<Vec<User>>;

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> AppResult<User>;

    /// Deletes the account and every pharmacy it owns. Returns the number of pharmacies removed.
    async fn delete_user(&self, id: Uuid) -> AppResult<u64>;
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn post_message(&self, message: NewChatMessage) -> AppResult<ChatMessage>;

    /// Oldest first.
    async fn conversation(&self, patient_id: Uuid) -> AppResult<Vec<ChatMessage>>;

    /// Most recently active first.
    async fn conversations(&self) -> AppResult<Vec<ConversationSummary>>;
}

#[async_trait]
pub trait Store: PharmacyStore + UserStore + ChatStore {
    async fn ping(&self) -> AppResult<()>;
}
