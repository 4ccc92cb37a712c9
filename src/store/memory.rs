use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ChatStore, PharmacyStore, Store, UserStore};
use crate::geo::GeoPoint;
use crate::models::{
    ChatMessage, ConversationSummary, NearbyPharmacy, NewChatMessage, NewPharmacy, NewUser, Pharmacy, PharmacyPatch,
    Role, Storefront, User, UserPatch,
};
use crate::{AppError, AppResult};

/// Process-local store. `find_near` is a linear haversine scan, so this backend is only
/// suitable for development and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    pharmacies: HashMap<Uuid, Pharmacy>,
    messages: Vec<ChatMessage>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn insert_pharmacy(&mut self, new: NewPharmacy) -> AppResult<Pharmacy> {
        let owner_ok = self
            .users
            .get(&new.owner_id)
            .map(|u| u.role == Role::Pharmacy)
            .unwrap_or(false);
        if !owner_ok {
            return Err(AppError::Validation(format!(
                "owner {} is not a pharmacy account",
                new.owner_id
            )));
        }

        let now = Utc::now();
        let pharmacy = Pharmacy {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            name: new.name,
            address: new.address,
            location: new.location,
            stock: new.stock,
            created_at: now,
            updated_at: now,
        };
        self.pharmacies.insert(pharmacy.id, pharmacy.clone());
        Ok(pharmacy)
    }
}

fn pharmacy_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Pharmacy {} not found", id))
}

fn user_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("User {} not found", id))
}

fn sorted_by_name(mut pharmacies: Vec<Pharmacy>) -> Vec<Pharmacy> {
    pharmacies.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    pharmacies
}

#[async_trait]
impl PharmacyStore for MemoryStore {
    async fn create_pharmacy(&self, new: NewPharmacy) -> AppResult<Pharmacy> {
        self.inner.write().await.insert_pharmacy(new)
    }

    async fn get_pharmacy(&self, id: Uuid) -> AppResult<Pharmacy> {
        self.inner
            .read()
            .await
            .pharmacies
            .get(&id)
            .cloned()
            .ok_or_else(|| pharmacy_not_found(id))
    }

    async fn update_pharmacy(&self, id: Uuid, patch: PharmacyPatch) -> AppResult<Pharmacy> {
        let mut inner = self.inner.write().await;
        let pharmacy = inner.pharmacies.get_mut(&id).ok_or_else(|| pharmacy_not_found(id))?;

        if let Some(name) = patch.name {
            pharmacy.name = name;
        }
        if let Some(address) = patch.address {
            pharmacy.address = address;
        }
        if let Some(location) = patch.location {
            pharmacy.location = location;
        }
        if let Some(stock) = patch.stock {
            pharmacy.stock = stock;
        }
        pharmacy.updated_at = Utc::now();

        Ok(pharmacy.clone())
    }

    async fn delete_pharmacy(&self, id: Uuid) -> AppResult<()> {
        self.inner
            .write()
            .await
            .pharmacies
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| pharmacy_not_found(id))
    }

    async fn find_near(&self, point: GeoPoint, max_distance_meters: f64) -> AppResult<Vec<NearbyPharmacy>> {
        let inner = self.inner.read().await;
        let mut hits: Vec<NearbyPharmacy> = inner
            .pharmacies
            .values()
            .filter_map(|p| {
                let distance_meters = point.distance_meters(&p.location);
                (distance_meters <= max_distance_meters).then(|| NearbyPharmacy {
                    pharmacy: p.clone(),
                    distance_meters,
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance_meters
                .total_cmp(&b.distance_meters)
                .then(a.pharmacy.id.cmp(&b.pharmacy.id))
        });
        Ok(hits)
    }

    async fn list_pharmacies_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Pharmacy>> {
        let inner = self.inner.read().await;
        Ok(sorted_by_name(
            inner
                .pharmacies
                .values()
                .filter(|p| p.owner_id == owner_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_pharmacies(&self) -> AppResult<Vec<Pharmacy>> {
        let inner = self.inner.read().await;
        Ok(sorted_by_name(inner.pharmacies.values().cloned().collect()))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser, storefront: Option<Storefront>) -> AppResult<(User, Option<Pharmacy>)> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(format!("Email {} is already registered", user.email)));
        }

        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            role: user.role,
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            phone: user.phone,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(created.id, created.clone());

        let pharmacy = match storefront {
            Some(storefront) => match inner.insert_pharmacy(NewPharmacy::from_storefront(created.id, storefront)) {
                Ok(p) => Some(p),
                Err(e) => {
                    inner.users.remove(&created.id);
                    return Err(e);
                }
            },
            None => None,
        };

        Ok((created, pharmacy))
    }

    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.inner
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| user_not_found(id))
    }

    async fn find_user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .inner
            .read()
            .await
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self, role: Option<Role>) -> AppResult<Vec<User>> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner
            .users
            .values()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .cloned()
            .collect();
        users.sort_by(|a, b| a.email.cmp(&b.email));
        Ok(users)
    }

    async fn update_user(&self, id: Uuid, patch: UserPatch) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        let user = inner.users.get_mut(&id).ok_or_else(|| user_not_found(id))?;

        if let Some(full_name) = patch.full_name {
            user.full_name = full_name;
        }
        if let Some(phone) = patch.phone {
            user.phone = phone;
        }
        if let Some(is_active) = patch.is_active {
            user.is_active = is_active;
        }
        if let Some(password_hash) = patch.password_hash {
            user.password_hash = password_hash;
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn delete_user(&self, id: Uuid) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        if inner.users.remove(&id).is_none() {
            return Err(user_not_found(id));
        }

        let before = inner.pharmacies.len();
        inner.pharmacies.retain(|_, p| p.owner_id != id);
        let removed = (before - inner.pharmacies.len()) as u64;

        inner.messages.retain(|m| m.patient_id != id);
        Ok(removed)
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn post_message(&self, message: NewChatMessage) -> AppResult<ChatMessage> {
        let mut inner = self.inner.write().await;
        let patient_ok = inner
            .users
            .get(&message.patient_id)
            .map(|u| u.role == Role::Patient)
            .unwrap_or(false);
        if !patient_ok {
            return Err(AppError::NotFound(format!("Patient {} not found", message.patient_id)));
        }

        let created = ChatMessage {
            id: Uuid::new_v4(),
            patient_id: message.patient_id,
            sender_id: message.sender_id,
            sender_role: message.sender_role,
            body: message.body,
            created_at: Utc::now(),
        };
        inner.messages.push(created.clone());
        Ok(created)
    }

    async fn conversation(&self, patient_id: Uuid) -> AppResult<Vec<ChatMessage>> {
        let inner = self.inner.read().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.patient_id == patient_id)
            .cloned()
            .collect())
    }

    async fn conversations(&self) -> AppResult<Vec<ConversationSummary>> {
        let inner = self.inner.read().await;
        let mut by_patient: HashMap<Uuid, ConversationSummary> = HashMap::new();
        for m in &inner.messages {
            by_patient
                .entry(m.patient_id)
                .and_modify(|s| {
                    s.message_count += 1;
                    s.last_message_at = s.last_message_at.max(m.created_at);
                })
                .or_insert(ConversationSummary {
                    patient_id: m.patient_id,
                    message_count: 1,
                    last_message_at: m.created_at,
                });
        }

        let mut summaries: Vec<ConversationSummary> = by_patient.into_values().collect();
        summaries.sort_by(|a, b| {
            b.last_message_at
                .cmp(&a.last_message_at)
                .then(a.patient_id.cmp(&b.patient_id))
        });
        Ok(summaries)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
