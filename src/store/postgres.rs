use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgConnection, PgPool};
use uuid::Uuid;

use super::{ChatStore, PharmacyStore, Store, UserStore};
use crate::geo::GeoPoint;
use crate::models::{
    ChatMessage, ConversationSummary, NearbyPharmacy, NewChatMessage, NewPharmacy, NewUser, Pharmacy, PharmacyPatch,
    Role, StockEntry, Storefront, User, UserPatch,
};
use crate::{AppError, AppResult};

/// PostGIS-backed store. `pharmacies.location` is a `geography(Point, 4326)` column with a GIST
/// index, so radius queries go through `ST_DWithin` rather than a table scan. Distances are
/// measured on the sphere (`use_spheroid = false`) to match `GeoPoint::distance_meters`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const PHARMACY_COLUMNS: &str = r#"
    id, owner_id, name, address,
    ST_Y(location::geometry) AS latitude,
    ST_X(location::geometry) AS longitude,
    stock, created_at, updated_at
"#;

const USER_COLUMNS: &str = "id, role, email, password_hash, full_name, phone, is_active, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, patient_id, sender_id, sender_role, body, created_at";

#[derive(FromRow)]
struct PharmacyRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    address: String,
    latitude: f64,
    longitude: f64,
    stock: Json<Vec<StockEntry>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PharmacyRow> for Pharmacy {
    fn from(row: PharmacyRow) -> Self {
        Pharmacy {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            address: row.address,
            location: GeoPoint {
                lat: row.latitude,
                lng: row.longitude,
            },
            stock: row.stock.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct NearbyRow {
    #[sqlx(flatten)]
    pharmacy: PharmacyRow,
    distance_meters: f64,
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    role: String,
    email: String,
    password_hash: String,
    full_name: String,
    phone: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            role: row.role.parse().map_err(AppError::Internal)?,
            email: row.email,
            password_hash: row.password_hash,
            full_name: row.full_name,
            phone: row.phone,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct MessageRow {
    id: Uuid,
    patient_id: Uuid,
    sender_id: Uuid,
    sender_role: String,
    body: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for ChatMessage {
    type Error = AppError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        Ok(ChatMessage {
            id: row.id,
            patient_id: row.patient_id,
            sender_id: row.sender_id,
            sender_role: row.sender_role.parse().map_err(AppError::Internal)?,
            body: row.body,
            created_at: row.created_at,
        })
    }
}

fn pharmacy_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Pharmacy {} not found", id))
}

fn user_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("User {} not found", id))
}

/// Shared by `create_pharmacy` and owner registration so both run the same owner check,
/// the latter inside its transaction.
async fn insert_pharmacy(conn: &mut PgConnection, new: NewPharmacy) -> AppResult<Pharmacy> {
    let sql = format!(
        r#"
        INSERT INTO pharmacies (id, owner_id, name, address, location, stock)
        SELECT $1, $2, $3, $4, ST_SetSRID(ST_MakePoint($6, $5), 4326)::geography, $7
        WHERE EXISTS (SELECT 1 FROM users WHERE id = $2 AND role = 'pharmacy')
        RETURNING {}
        "#,
        PHARMACY_COLUMNS
    );

    let row = sqlx::query_as::<_, PharmacyRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(new.owner_id)
        .bind(&new.name)
        .bind(&new.address)
        .bind(new.location.lat)
        .bind(new.location.lng)
        .bind(Json(&new.stock))
        .fetch_optional(&mut *conn)
        .await?;

    row.map(Pharmacy::from).ok_or_else(|| {
        tracing::warn!(owner_id = %new.owner_id, "Rejected pharmacy with invalid owner");
        AppError::Validation(format!("owner {} is not a pharmacy account", new.owner_id))
    })
}

#[async_trait]
impl PharmacyStore for PgStore {
    async fn create_pharmacy(&self, new: NewPharmacy) -> AppResult<Pharmacy> {
        let mut conn = self.pool.acquire().await?;
        insert_pharmacy(&mut conn, new).await
    }

    async fn get_pharmacy(&self, id: Uuid) -> AppResult<Pharmacy> {
        let sql = format!("SELECT {} FROM pharmacies WHERE id = $1", PHARMACY_COLUMNS);
        sqlx::query_as::<_, PharmacyRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Pharmacy::from)
            .ok_or_else(|| pharmacy_not_found(id))
    }

    async fn update_pharmacy(&self, id: Uuid, patch: PharmacyPatch) -> AppResult<Pharmacy> {
        // Build dynamic UPDATE query
        let mut updates = vec!["updated_at = now()".to_string()];
        let mut bind_count = 1;

        if patch.name.is_some() {
            updates.push(format!("name = ${}", bind_count));
            bind_count += 1;
        }
        if patch.address.is_some() {
            updates.push(format!("address = ${}", bind_count));
            bind_count += 1;
        }
        if patch.location.is_some() {
            updates.push(format!(
                "location = ST_SetSRID(ST_MakePoint(${}, ${}), 4326)::geography",
                bind_count + 1,
                bind_count
            ));
            bind_count += 2;
        }
        if patch.stock.is_some() {
            updates.push(format!("stock = ${}", bind_count));
            bind_count += 1;
        }

        let sql = format!(
            "UPDATE pharmacies SET {} WHERE id = ${} RETURNING {}",
            updates.join(", "),
            bind_count,
            PHARMACY_COLUMNS
        );

        let mut query = sqlx::query_as::<_, PharmacyRow>(&sql);
        if let Some(name) = &patch.name {
            query = query.bind(name);
        }
        if let Some(address) = &patch.address {
            query = query.bind(address);
        }
        if let Some(location) = &patch.location {
            query = query.bind(location.lat).bind(location.lng);
        }
        if let Some(stock) = &patch.stock {
            query = query.bind(Json(stock));
        }
        query = query.bind(id);

        query
            .fetch_optional(&self.pool)
            .await?
            .map(Pharmacy::from)
            .ok_or_else(|| pharmacy_not_found(id))
    }

    async fn delete_pharmacy(&self, id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM pharmacies WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(pharmacy_not_found(id));
        }
        Ok(())
    }

    async fn find_near(&self, point: GeoPoint, max_distance_meters: f64) -> AppResult<Vec<NearbyPharmacy>> {
        let sql = format!(
            r#"
            SELECT {},
                   ST_Distance(location, ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography, false) AS distance_meters
            FROM pharmacies
            WHERE ST_DWithin(location, ST_SetSRID(ST_MakePoint($2, $1), 4326)::geography, $3, false)
            ORDER BY distance_meters, id
            "#,
            PHARMACY_COLUMNS
        );

        let rows = sqlx::query_as::<_, NearbyRow>(&sql)
            .bind(point.lat)
            .bind(point.lng)
            .bind(max_distance_meters)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| NearbyPharmacy {
                pharmacy: row.pharmacy.into(),
                distance_meters: row.distance_meters,
            })
            .collect())
    }

    async fn list_pharmacies_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Pharmacy>> {
        let sql = format!(
            "SELECT {} FROM pharmacies WHERE owner_id = $1 ORDER BY name, id",
            PHARMACY_COLUMNS
        );
        let rows = sqlx::query_as::<_, PharmacyRow>(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Pharmacy::from).collect())
    }

    async fn list_pharmacies(&self) -> AppResult<Vec<Pharmacy>> {
        let sql = format!("SELECT {} FROM pharmacies ORDER BY name, id", PHARMACY_COLUMNS);
        let rows = sqlx::query_as::<_, PharmacyRow>(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Pharmacy::from).collect())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser, storefront: Option<Storefront>) -> AppResult<(User, Option<Pharmacy>)> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            r#"
            INSERT INTO users (id, role, email, password_hash, full_name, phone)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(user.role.as_str())
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.full_name)
            .bind(&user.phone)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match AppError::from(e) {
                AppError::Conflict(_) => AppError::Conflict(format!("Email {} is already registered", user.email)),
                other => other,
            })?;
        let created = User::try_from(row)?;

        let pharmacy = match storefront {
            Some(storefront) => {
                Some(insert_pharmacy(&mut tx, NewPharmacy::from_storefront(created.id, storefront)).await?)
            }
            None => None,
        };

        tx.commit().await?;
        Ok((created, pharmacy))
    }

    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| user_not_found(id))?
            .try_into()
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn list_users(&self, role: Option<Role>) -> AppResult<Vec<User>> {
        let sql = format!(
            "SELECT {} FROM users WHERE ($1::text IS NULL OR role = $1) ORDER BY email",
            USER_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(role.map(|r| r.as_str()))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(User::try_from).collect()
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> AppResult<User> {
        let mut updates = vec!["updated_at = now()".to_string()];
        let mut bind_count = 1;

        if patch.full_name.is_some() {
            updates.push(format!("full_name = ${}", bind_count));
            bind_count += 1;
        }
        if patch.phone.is_some() {
            updates.push(format!("phone = ${}", bind_count));
            bind_count += 1;
        }
        if patch.is_active.is_some() {
            updates.push(format!("is_active = ${}", bind_count));
            bind_count += 1;
        }
        if patch.password_hash.is_some() {
            updates.push(format!("password_hash = ${}", bind_count));
            bind_count += 1;
        }

        let sql = format!(
            "UPDATE users SET {} WHERE id = ${} RETURNING {}",
            updates.join(", "),
            bind_count,
            USER_COLUMNS
        );

        let mut query = sqlx::query_as::<_, UserRow>(&sql);
        if let Some(full_name) = &patch.full_name {
            query = query.bind(full_name);
        }
        if let Some(phone) = &patch.phone {
            query = query.bind(phone);
        }
        if let Some(is_active) = patch.is_active {
            query = query.bind(is_active);
        }
        if let Some(password_hash) = &patch.password_hash {
            query = query.bind(password_hash);
        }
        query = query.bind(id);

        query
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| user_not_found(id))?
            .try_into()
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<u64> {
        let mut tx = self.pool.begin().await?;

        let pharmacies = sqlx::query("DELETE FROM pharmacies WHERE owner_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        // chat_messages rows go with the user via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(user_not_found(id));
        }

        tx.commit().await?;
        if pharmacies > 0 {
            tracing::info!(user_id = %id, pharmacies, "Deleted owner and owned pharmacies");
        }
        Ok(pharmacies)
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn post_message(&self, message: NewChatMessage) -> AppResult<ChatMessage> {
        let sql = format!(
            r#"
            INSERT INTO chat_messages (id, patient_id, sender_id, sender_role, body)
            SELECT $1, $2, $3, $4, $5
            WHERE EXISTS (SELECT 1 FROM users WHERE id = $2 AND role = 'patient')
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        );

        sqlx::query_as::<_, MessageRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(message.patient_id)
            .bind(message.sender_id)
            .bind(message.sender_role.as_str())
            .bind(&message.body)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Patient {} not found", message.patient_id)))?
            .try_into()
    }

    async fn conversation(&self, patient_id: Uuid) -> AppResult<Vec<ChatMessage>> {
        let sql = format!(
            "SELECT {} FROM chat_messages WHERE patient_id = $1 ORDER BY seq",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query_as::<_, MessageRow>(&sql)
            .bind(patient_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(ChatMessage::try_from).collect()
    }

    async fn conversations(&self) -> AppResult<Vec<ConversationSummary>> {
        let summaries = sqlx::query_as::<_, ConversationSummary>(
            r#"
            SELECT patient_id,
                   COUNT(*)::int8 AS message_count,
                   MAX(created_at) AS last_message_at
            FROM chat_messages
            GROUP BY patient_id
            ORDER BY last_message_at DESC, patient_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(summaries)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations};

    // These tests need a PostGIS database:
    // DATABASE_URL=postgres://... cargo test -- --ignored

    async fn connect() -> PgStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a PostGIS database");
        let pool = create_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        PgStore::new(pool)
    }

    async fn owner(store: &PgStore) -> User {
        let (user, _) = store
            .create_user(
                NewUser {
                    role: Role::Pharmacy,
                    email: format!("owner-{}@example.com", Uuid::new_v4()),
                    password_hash: "hash".into(),
                    full_name: "Owner".into(),
                    phone: None,
                },
                None,
            )
            .await
            .unwrap();
        user
    }

    async fn pharmacy_at(store: &PgStore, owner_id: Uuid, name: &str, lat: f64, lng: f64) -> Pharmacy {
        store
            .create_pharmacy(NewPharmacy {
                owner_id,
                name: name.into(),
                address: "Main Street".into(),
                location: GeoPoint { lat, lng },
                stock: vec![StockEntry {
                    medicine_name: "Paracetamol".into(),
                    price: 25.0,
                    quantity: Some(10),
                    is_available: true,
                }],
            })
            .await
            .unwrap()
    }

    /// Rows left by other runs may sit at the same coordinates; only look at our own.
    fn only<'a>(results: &'a [NearbyPharmacy], ids: &[Uuid]) -> Vec<&'a NearbyPharmacy> {
        results.iter().filter(|r| ids.contains(&r.pharmacy.id)).collect()
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL
    async fn find_near_keeps_the_radius_and_orders_by_distance() {
        let store = connect().await;
        let owner = owner(&store).await;
        let origin = GeoPoint { lat: 6.0825, lng: 80.2973 };

        let p1 = pharmacy_at(&store, owner.id, "P1", 6.0825, 80.2973).await;
        let p2 = pharmacy_at(&store, owner.id, "P2", 6.2000, 80.5000).await;
        let p3 = pharmacy_at(&store, owner.id, "P3", 6.1100, 80.3200).await;

        // Coordinates read back on the right axes
        assert!((p1.location.lat - 6.0825).abs() < 1e-9);
        assert!((p1.location.lng - 80.2973).abs() < 1e-9);

        let results = store.find_near(origin, 10_000.0).await.unwrap();
        let ours = only(&results, &[p1.id, p2.id, p3.id]);
        let names: Vec<&str> = ours.iter().map(|r| r.pharmacy.name.as_str()).collect();
        assert_eq!(names, ["P1", "P3"]);

        assert!(results.windows(2).all(|w| w[0].distance_meters <= w[1].distance_meters));
        assert!(results.iter().all(|r| r.distance_meters <= 10_000.0));
        for r in &ours {
            let expected = origin.distance_meters(&r.pharmacy.location);
            assert!((r.distance_meters - expected).abs() < 1.0, "{} vs {}", r.distance_meters, expected);
        }

        store.delete_user(owner.id).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL
    async fn moved_pharmacy_is_found_at_its_new_location() {
        let store = connect().await;
        let owner = owner(&store).await;
        let origin = GeoPoint { lat: 6.0825, lng: 80.2973 };

        let far = pharmacy_at(&store, owner.id, "Far", 6.2000, 80.5000).await;
        let results = store.find_near(origin, 10_000.0).await.unwrap();
        assert!(only(&results, &[far.id]).is_empty());

        let moved = store
            .update_pharmacy(
                far.id,
                PharmacyPatch {
                    location: Some(GeoPoint { lat: 6.0830, lng: 80.2980 }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!((moved.location.lat - 6.0830).abs() < 1e-9);
        assert!((moved.location.lng - 80.2980).abs() < 1e-9);

        let results = store.find_near(origin, 10_000.0).await.unwrap();
        assert_eq!(only(&results, &[far.id]).len(), 1);

        store.delete_user(owner.id).await.unwrap();
    }
}
