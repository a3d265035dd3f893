//! Multiple placed model instances for the AR-world view.

use glam::{Quat, Vec3};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedModel {
    pub id: Uuid,
    pub position: Vec3,
    pub rotation: Quat,
}

/// Insertion-ordered set of placed models. Order is for display only.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PlacementSet {
    items: Vec<PlacedModel>,
}

impl PlacementSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a new instance at `position`, facing `yaw` radians around Y.
    pub fn place(&mut self, position: Vec3, yaw: f32) -> Uuid {
        let model = PlacedModel {
            id: Uuid::new_v4(),
            position,
            rotation: Quat::from_rotation_y(yaw),
        };
        self.items.push(model);
        log::debug!("Placed model {} at {:?}", model.id, position);
        model.id
    }

    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        before != self.items.len()
    }

    pub fn reset(&mut self) {
        self.items.clear();
    }

    pub fn get(&self, id: Uuid) -> Option<&PlacedModel> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacedModel> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_by_id_keeps_others_in_order() {
        let mut set = PlacementSet::new();
        let a = set.place(Vec3::X, 0.0);
        let b = set.place(Vec3::Y, 0.0);
        let c = set.place(Vec3::Z, 0.0);

        assert!(set.remove(b));
        assert!(!set.remove(b));
        let ids: Vec<_> = set.iter().map(|item| item.id).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[test]
    fn reset_clears_everything() {
        let mut set = PlacementSet::new();
        set.place(Vec3::ZERO, 1.0);
        set.place(Vec3::ONE, 2.0);
        set.reset();
        assert!(set.is_empty());
    }
}
