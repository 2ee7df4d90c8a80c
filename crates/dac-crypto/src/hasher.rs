use dac_types::{ObjectId, OBJECT_ID_LEN};

/// Computes object identities.
///
/// The digest input is `pred_0 || pred_1 || ... || content`: each predecessor
/// id contributes its 64 raw bytes, in the order given, followed by the
/// content bytes. No framing or domain tag is added, so any implementation
/// of the same rule over BLAKE3's XOF reproduces the same ids.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjectHasher;

impl ObjectHasher {
    /// Digest an object's predecessor links and content into its id.
    pub fn object_id(predecessors: &[ObjectId], content: &[u8]) -> ObjectId {
        let mut hasher = blake3::Hasher::new();
        for pred in predecessors {
            hasher.update(pred.as_bytes());
        }
        hasher.update(content);
        let mut digest = [0u8; OBJECT_ID_LEN];
        hasher.finalize_xof().fill(&mut digest);
        ObjectId::from_digest(digest)
    }

    /// Verify that links and content produce the expected id.
    pub fn verify(predecessors: &[ObjectId], content: &[u8], expected: &ObjectId) -> bool {
        Self::object_id(predecessors, content) == *expected
    }
}
