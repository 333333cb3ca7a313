use inkwire_shared::{User, UserSummary};
use rand::Rng;
use uuid::Uuid;

const NAME_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Connected users in join order.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    users: Vec<User>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, connection_id: Uuid, now: u64) -> User {
        let mut rng = rand::thread_rng();
        let user = User {
            id: connection_id.to_string(),
            name: random_name(&mut rng),
            color: random_color(&mut rng),
            joined_at: now,
        };
        self.remove_user(connection_id);
        self.users.push(user.clone());
        user
    }

    pub fn remove_user(&mut self, connection_id: Uuid) -> Option<User> {
        let id = connection_id.to_string();
        let index = self.users.iter().position(|user| user.id == id)?;
        Some(self.users.remove(index))
    }

    pub fn get_user(&self, connection_id: Uuid) -> Option<&User> {
        let id = connection_id.to_string();
        self.users.iter().find(|user| user.id == id)
    }

    pub fn list_users(&self) -> Vec<UserSummary> {
        self.users.iter().map(User::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

fn random_name(rng: &mut impl Rng) -> String {
    let suffix: String = (0..5)
        .map(|_| NAME_ALPHABET[rng.gen_range(0..NAME_ALPHABET.len())] as char)
        .collect();
    format!("User-{suffix}")
}

fn random_color(rng: &mut impl Rng) -> String {
    let hue = rng.gen_range(0..360);
    format!("hsl({hue} 70% 45%)")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_are_listed_in_join_order() {
        let mut registry = PresenceRegistry::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();
        for id in [first, second, third] {
            registry.add_user(id, 1);
        }
        registry.remove_user(second);
        let listed = registry
            .list_users()
            .into_iter()
            .map(|user| user.id)
            .collect::<Vec<_>>();
        assert_eq!(listed, [first.to_string(), third.to_string()]);
    }

    #[test]
    fn generated_identity_has_expected_shape() {
        let mut registry = PresenceRegistry::new();
        let id = Uuid::new_v4();
        let user = registry.add_user(id, 77);
        assert_eq!(user.id, id.to_string());
        assert_eq!(user.joined_at, 77);
        let suffix = user.name.strip_prefix("User-").unwrap();
        assert_eq!(suffix.len(), 5);
        assert!(suffix.bytes().all(|byte| NAME_ALPHABET.contains(&byte)));
        assert!(user.color.starts_with("hsl(") && user.color.ends_with(" 70% 45%)"));
        assert_eq!(registry.get_user(id), Some(&user));
    }

    #[test]
    fn rejoining_replaces_the_previous_entry() {
        let mut registry = PresenceRegistry::new();
        let id = Uuid::new_v4();
        registry.add_user(id, 1);
        registry.add_user(id, 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_user(id).map(|user| user.joined_at), Some(2));
        assert!(registry.remove_user(id).is_some());
        assert!(registry.remove_user(id).is_none());
        assert!(registry.is_empty());
    }
}
