//! Shared immersive spaces
//!
//! Spaces are instantiated from a static environment catalog and hold a
//! live participant list with a capacity cap. Spawn positions are a
//! deterministic ring around the origin: slot `i` sits at angle
//! `i * 2π / 8` on a radius-5 circle, facing the center.

use bson::{doc, Document};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::db::schemas::{SpaceDoc, UserDoc, SPACE_COLLECTION, USER_COLLECTION};
use crate::db::MongoClient;
use crate::types::{LumenError, Result};

/// Ring slots before spawn positions repeat
const SPAWN_RING_SLOTS: usize = 8;
/// Spawn ring radius
const SPAWN_RADIUS: f64 = 5.0;

/// An environment template from the static catalog
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnvironmentTemplate {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub background: &'static str,
    pub lighting: &'static str,
    pub ambient_sound: &'static str,
    pub objects: &'static [&'static str],
    pub interaction_zones: &'static [&'static str],
}

/// The full environment catalog
pub const ENVIRONMENT_TEMPLATES: &[EnvironmentTemplate] = &[
    EnvironmentTemplate {
        key: "cosmic",
        name: "Cosmic Reflection",
        description: "A vast starfield with floating geometric shapes for deep contemplation",
        background: "gradient_nebula",
        lighting: "soft_cosmic",
        ambient_sound: "cosmic_drone",
        objects: &["floating_crystals", "particle_streams", "constellation_map"],
        interaction_zones: &["meditation_sphere", "memory_gallery", "insight_altar"],
    },
    EnvironmentTemplate {
        key: "minimal",
        name: "Minimal Void",
        description: "Clean, minimalist space focused on pure thought and reflection",
        background: "gradient_void",
        lighting: "directional_soft",
        ambient_sound: "white_noise",
        objects: &["geometric_podium", "light_beam", "floating_text"],
        interaction_zones: &["thought_pedestal", "question_void", "answer_beam"],
    },
    EnvironmentTemplate {
        key: "nature",
        name: "Digital Forest",
        description: "Serene digital nature environment for grounded exploration",
        background: "forest_clearing",
        lighting: "dappled_sunlight",
        ambient_sound: "nature_sounds",
        objects: &["digital_trees", "flowing_stream", "butterfly_swarm"],
        interaction_zones: &["wisdom_tree", "reflection_pool", "growth_garden"],
    },
    EnvironmentTemplate {
        key: "abstract",
        name: "Abstract Mindscape",
        description: "Surreal abstract environment representing the unconscious mind",
        background: "morphing_shapes",
        lighting: "dynamic_colors",
        ambient_sound: "ambient_synthesis",
        objects: &["morphing_sculptures", "color_waves", "thought_fragments"],
        interaction_zones: &["subconscious_portal", "dream_weaver", "emotion_prism"],
    },
];

/// Look up a catalog template by key
pub fn environment_template(key: &str) -> Option<&'static EnvironmentTemplate> {
    ENVIRONMENT_TEMPLATES.iter().find(|t| t.key == key)
}

/// Spawn position for the participant at `index`, as world coordinates
/// plus a yaw facing the ring center.
pub fn spawn_position(index: usize) -> Value {
    let angle = (index % SPAWN_RING_SLOTS) as f64 * 2.0 * std::f64::consts::PI
        / SPAWN_RING_SLOTS as f64;
    json!({
        "x": SPAWN_RADIUS * angle.cos(),
        "y": 0.0,
        "z": SPAWN_RADIUS * angle.sin(),
        "rotationY": angle + std::f64::consts::PI,
    })
}

/// Filter matching the space only while it has a free slot and the user
/// is not already in it. The last-allowed array index must be absent,
/// so the membership write and the capacity check are one document
/// operation and concurrent joins cannot overfill a space.
fn join_filter(space_id: &str, user_id: &str, max_participants: i64) -> Document {
    let last_slot = max_participants.max(1) - 1;
    let mut filter = doc! {
        "id": space_id,
        "participants": { "$ne": user_id },
    };
    filter.insert(
        format!("participants.{}", last_slot),
        doc! { "$exists": false },
    );
    filter
}

/// Result of joining a space
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceJoin {
    pub space: SpaceDoc,
    pub spawn_position: Value,
    pub participant_count: usize,
}

#[derive(Clone)]
pub struct SpacesService {
    mongo: MongoClient,
}

impl SpacesService {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }

    /// Create a space from a catalog template
    pub async fn create_space(
        &self,
        creator_id: &str,
        environment_type: &str,
        name: Option<String>,
        is_public: bool,
    ) -> Result<SpaceDoc> {
        let template = environment_template(environment_type).ok_or_else(|| {
            LumenError::invalid_input(format!("unknown environment '{}'", environment_type))
        })?;

        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        if users.find_one(doc! { "id": creator_id }).await?.is_none() {
            return Err(LumenError::not_found(format!("user {}", creator_id)));
        }

        let name = name.unwrap_or_else(|| template.name.to_string());
        let space = SpaceDoc::new(
            creator_id,
            name,
            Some(template.description.to_string()),
            template.key.to_string(),
            is_public,
        );

        let spaces = self.mongo.collection::<SpaceDoc>(SPACE_COLLECTION).await?;
        spaces.insert_one(space.clone()).await?;

        info!(creator_id, space_id = %space.id, environment = template.key, "space created");
        Ok(space)
    }

    /// Join a space, assigning the next ring slot
    pub async fn join_space(&self, user_id: &str, space_id: &str) -> Result<SpaceJoin> {
        let users = self.mongo.collection::<UserDoc>(USER_COLLECTION).await?;
        if users.find_one(doc! { "id": user_id }).await?.is_none() {
            return Err(LumenError::not_found(format!("user {}", user_id)));
        }

        let spaces = self.mongo.collection::<SpaceDoc>(SPACE_COLLECTION).await?;
        let space = spaces
            .find_one(doc! { "id": space_id })
            .await?
            .ok_or_else(|| LumenError::not_found(format!("space {}", space_id)))?;

        if space.participants.iter().any(|id| id == user_id) {
            return Err(LumenError::conflict("already in this space"));
        }
        if space.participants.len() as i64 >= space.max_participants {
            return Err(LumenError::conflict("space is full"));
        }

        let result = spaces
            .update_one(
                join_filter(space_id, user_id, space.max_participants),
                doc! { "$addToSet": { "participants": user_id } },
            )
            .await?;
        if result.matched_count == 0 {
            // Lost a race since the read: either the last slot went to
            // someone else or this user joined from another request.
            let current = spaces
                .find_one(doc! { "id": space_id })
                .await?
                .ok_or_else(|| LumenError::not_found(format!("space {}", space_id)))?;
            if current.participants.iter().any(|id| id == user_id) {
                return Err(LumenError::conflict("already in this space"));
            }
            return Err(LumenError::conflict("space is full"));
        }

        let slot = space.participants.len();
        let mut joined = space;
        joined.participants.push(user_id.to_string());
        let participant_count = joined.participants.len();

        Ok(SpaceJoin {
            space: joined,
            spawn_position: spawn_position(slot),
            participant_count,
        })
    }

    pub async fn leave_space(&self, user_id: &str, space_id: &str) -> Result<()> {
        let spaces = self.mongo.collection::<SpaceDoc>(SPACE_COLLECTION).await?;
        let result = spaces
            .update_one(
                doc! { "id": space_id },
                doc! { "$pull": { "participants": user_id } },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(LumenError::not_found(format!("space {}", space_id)));
        }
        Ok(())
    }

    /// Public spaces, most recent first
    pub async fn list_public(&self, limit: i64) -> Result<Vec<SpaceDoc>> {
        let spaces = self.mongo.collection::<SpaceDoc>(SPACE_COLLECTION).await?;
        spaces
            .find_with_options(
                doc! { "is_public": true },
                Some(doc! { "metadata.created_at": -1 }),
                Some(limit),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_the_four_environments() {
        let keys: Vec<_> = ENVIRONMENT_TEMPLATES.iter().map(|t| t.key).collect();
        assert_eq!(keys, vec!["cosmic", "minimal", "nature", "abstract"]);
        assert!(environment_template("nature").is_some());
        assert!(environment_template("lava").is_none());
    }

    #[test]
    fn join_filter_guards_capacity_and_duplicates() {
        let filter = join_filter("space-1", "user-1", 10);
        assert_eq!(filter.get_str("id").unwrap(), "space-1");
        assert_eq!(
            filter.get_document("participants").unwrap(),
            &doc! { "$ne": "user-1" }
        );
        // A full space has index max-1 occupied, so the filter misses it
        assert_eq!(
            filter.get_document("participants.9").unwrap(),
            &doc! { "$exists": false }
        );

        // A one-slot space guards index 0
        let filter = join_filter("space-1", "user-1", 1);
        assert!(filter.get_document("participants.0").is_ok());
    }

    #[test]
    fn spawn_ring_is_deterministic() {
        let first = spawn_position(0);
        assert_eq!(first["x"].as_f64().unwrap(), 5.0);
        assert_eq!(first["z"].as_f64().unwrap(), 0.0);

        // Slot 2 is a quarter turn: x ~ 0, z ~ 5
        let quarter = spawn_position(2);
        assert!(quarter["x"].as_f64().unwrap().abs() < 1e-9);
        assert!((quarter["z"].as_f64().unwrap() - 5.0).abs() < 1e-9);

        // Slots wrap after 8 participants
        assert_eq!(spawn_position(8), spawn_position(0));
    }
}
