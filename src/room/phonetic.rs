use rand::Rng;

const VOWELS: &[u8] = b"aeiou";
const CONSONANTS: &[u8] = b"bcdfghjklmnpqrstvwxyz";

/// A pronounceable room id: alternating consonants and vowels, starting
/// randomly with either, so ids read like `xemutilusejaxok` rather than a
/// raw hex/uuid string.
pub fn generate_phonetic_name(length: usize) -> String {
    let mut rng = rand::rng();
    let start_with_consonant = rng.random_bool(0.5);

    (0..length)
        .map(|i| {
            let from_consonants = (i % 2 == 0) == start_with_consonant;
            let alphabet = if from_consonants { CONSONANTS } else { VOWELS };
            let idx = rng.random_range(0..alphabet.len());
            alphabet[idx] as char
        })
        .collect()
}
