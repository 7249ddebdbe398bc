//! Authoritative world state: one avatar per registered client.

use std::collections::HashMap;

use log::info;
use shared::Vec3;

/// A server-owned avatar. The owner is fixed at spawn time and never
/// changes; the position moves only through validated Move commands.
#[derive(Debug, Clone)]
pub struct GameObject {
    pub id: u32,
    pub owner: u32,
    pub position: Vec3,
}

/// All game objects, keyed by id.
#[derive(Debug)]
pub struct World {
    objects: HashMap<u32, GameObject>,
    next_object_id: u32,
}

impl World {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            next_object_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Creates an avatar at the origin for the given client and returns
    /// its id.
    pub fn spawn(&mut self, owner: u32) -> u32 {
        let id = self.next_object_id;
        self.next_object_id += 1;

        self.objects.insert(
            id,
            GameObject {
                id,
                owner,
                position: Vec3::ZERO,
            },
        );
        info!("spawned avatar {} for client {}", id, owner);
        id
    }

    pub fn get(&self, id: u32) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    /// The avatar owned by the given client. Each client owns exactly one.
    pub fn avatar_of(&self, owner: u32) -> Option<&GameObject> {
        self.objects.values().find(|obj| obj.owner == owner)
    }

    /// Adds the displacement to the object's position, exactly once. The
    /// delta is a per-command step, never scaled by elapsed time.
    pub fn apply_move(&mut self, id: u32, delta: Vec3) {
        if let Some(object) = self.objects.get_mut(&id) {
            object.position += delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_spawn_at_origin() {
        let mut world = World::new();
        let id = world.spawn(1);

        let object = world.get(id).unwrap();
        assert_eq!(object.owner, 1);
        assert_eq!(object.position, Vec3::ZERO);
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_spawn_assigns_unique_ids() {
        let mut world = World::new();
        let first = world.spawn(1);
        let second = world.spawn(2);
        assert_ne!(first, second);
    }

    #[test]
    fn test_avatar_of_owner() {
        let mut world = World::new();
        let id = world.spawn(7);
        world.spawn(8);

        assert_eq!(world.avatar_of(7).unwrap().id, id);
        assert!(world.avatar_of(99).is_none());
    }

    #[test]
    fn test_moves_accumulate() {
        let mut world = World::new();
        let id = world.spawn(1);

        world.apply_move(id, Vec3::new(1.0, 1.0, 2.0));
        world.apply_move(id, Vec3::new(2.0, 2.0, 2.0));

        let position = world.get(id).unwrap().position;
        assert_approx_eq!(position.x, 3.0);
        assert_approx_eq!(position.y, 3.0);
        assert_approx_eq!(position.z, 4.0);
    }

    #[test]
    fn test_move_on_missing_object_does_nothing() {
        let mut world = World::new();
        world.apply_move(42, Vec3::new(1.0, 0.0, 0.0));
        assert!(world.is_empty());
    }
}
