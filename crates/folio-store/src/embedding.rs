//! Embedding blob encoding: little-endian f32, 4 bytes per component.

use ndarray::Array1;

/// Encode an embedding for SQLite BLOB storage.
pub fn vec_to_blob(embedding: &Array1<f32>) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`]. Trailing partial values are ignored.
pub fn blob_to_vec(bytes: &[u8]) -> Array1<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_blob_is_exact() {
        let original = array![0.1f32, -0.5, 3.25, f32::MIN_POSITIVE];
        let blob = vec_to_blob(&original);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_vec(&blob), original);
    }

    #[test]
    fn test_partial_trailing_bytes_ignored() {
        let mut blob = vec_to_blob(&array![1.0f32]);
        blob.push(7);
        assert_eq!(blob_to_vec(&blob), array![1.0f32]);
    }
}
