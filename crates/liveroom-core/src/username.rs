use rand::Rng;

const PREFIX: &str = "user";
const SUFFIX_LEN: usize = 13;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generate a default display name: `user` followed by 13 random
/// lowercase base-36 characters.
pub fn generate_username() -> String {
    generate_username_with(&mut rand::thread_rng())
}

pub fn generate_username_with<R: Rng>(rng: &mut R) -> String {
    let mut name = String::with_capacity(PREFIX.len() + SUFFIX_LEN);
    name.push_str(PREFIX);
    for _ in 0..SUFFIX_LEN {
        name.push(BASE36[rng.gen_range(0..BASE36.len())] as char);
    }
    name
}

/// The only check applied before a name is submitted.
pub fn is_submittable(name: &str) -> bool {
    !name.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn generated_name_has_prefix_and_length() {
        let name = generate_username();
        assert!(name.starts_with("user"));
        assert_eq!(name.len(), 17);
    }

    #[test]
    fn generated_suffix_is_lowercase_base36() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..64 {
            let name = generate_username_with(&mut rng);
            assert!(
                name[4..]
                    .chars()
                    .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
            );
        }
    }

    #[test]
    fn seeded_generation_is_deterministic() {
        let a = generate_username_with(&mut StdRng::seed_from_u64(42));
        let b = generate_username_with(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn only_empty_names_are_rejected() {
        assert!(!is_submittable(""));
        assert!(is_submittable("alice"));
        assert!(is_submittable(" "));
    }
}
