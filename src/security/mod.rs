//! Cryptography: content digests, group key resolution and the
//! compress+encrypt transform between plaintext and swarm artifacts.

pub mod digest;
pub mod keys;
pub mod transform;

pub use digest::{digest_bytes, digest_file};
pub use keys::{GroupKeyRef, KeyService};
pub use transform::{decrypt_file, encrypt_file, FIXED_IV};
