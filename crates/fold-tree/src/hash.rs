use sha2::{Digest, Sha256};

use crate::tree::{EdgeKind, FoldTree};

/// Computes the canonical structural hash of a tree.
pub fn canonical_hash(tree: &FoldTree) -> String {
    let mut hasher = Sha256::new();
    hasher.update((tree.size() as u64).to_le_bytes());
    hasher.update((tree.root() as u64).to_le_bytes());
    hasher.update((tree.edges().len() as u64).to_le_bytes());
    for edge in tree.edges() {
        hasher.update((edge.start as u64).to_le_bytes());
        hasher.update((edge.stop as u64).to_le_bytes());
        match edge.kind {
            EdgeKind::Bond => hasher.update(b"bond"),
            EdgeKind::Jump => hasher.update(b"jump"),
        }
        encode_label(edge.start_attachment.as_deref(), &mut hasher);
        encode_label(edge.stop_attachment.as_deref(), &mut hasher);
    }
    format!("{:x}", hasher.finalize())
}

fn encode_label(label: Option<&str>, hasher: &mut Sha256) {
    match label {
        Some(text) => {
            hasher.update(b":some");
            hasher.update((text.len() as u64).to_le_bytes());
            hasher.update(text.as_bytes());
        }
        None => hasher.update(b":none"),
    }
}
