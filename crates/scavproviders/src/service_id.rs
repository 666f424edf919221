use rand::Rng;

const SERVICE_ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const HYPHEN_PROBABILITY: f64 = 0.15;

pub const MIN_SERVICE_ID_LENGTH: usize = 20;
pub const MAX_SERVICE_ID_LENGTH: usize = 49;

/// Random Cloud Run service id.
///
/// Starts with a lowercase letter, is `MIN..MAX` characters long (upper
/// bound exclusive), uses `[a-z0-9]` with sparse hyphens, never places two
/// hyphens side by side and never ends with one.
pub fn generate_service_id<R: Rng + ?Sized>(rng: &mut R) -> String {
    let length = rng.gen_range(MIN_SERVICE_ID_LENGTH..MAX_SERVICE_ID_LENGTH);
    let mut id = String::with_capacity(length);

    id.push(rng.gen_range(b'a'..=b'z') as char);

    let mut prev_hyphen = false;
    for _ in 1..length - 1 {
        if !prev_hyphen && rng.gen_bool(HYPHEN_PROBABILITY) {
            id.push('-');
            prev_hyphen = true;
        } else {
            id.push(random_char(rng));
            prev_hyphen = false;
        }
    }

    id.push(random_char(rng));
    id
}

fn random_char<R: Rng + ?Sized>(rng: &mut R) -> char {
    SERVICE_ID_CHARSET[rng.gen_range(0..SERVICE_ID_CHARSET.len())] as char
}
