/// Key layout and encoding utilities for catalog partitions
///
/// Partition structure:
/// - `images`: image:{image_id} -> ImageRecord (JSON)
/// - `files`: file:{image_id}:{file_id} -> FileRecord (JSON)
/// - `tasks`: task:{batch_id}:{image_id} -> ImportTaskRow (JSON)
/// - `albums`: album:{album_id} -> Album (JSON)
/// - `album_images`: album_image:{album_id}:{image_id} -> added_at (RFC 3339)
///
/// Ids are UUIDs and never contain `:`, so a prefix scan over
/// `file:{image_id}:` only ever matches that image.

/// Encode an image key: image:{image_id}
pub fn encode_image_key(image_id: &str) -> Vec<u8> {
    format!("image:{}", image_id).into_bytes()
}

/// Encode a file key: file:{image_id}:{file_id}
pub fn encode_file_key(image_id: &str, file_id: &str) -> Vec<u8> {
    format!("file:{}:{}", image_id, file_id).into_bytes()
}

/// Encode a file prefix for range scan: file:{image_id}:
pub fn encode_file_prefix(image_id: &str) -> Vec<u8> {
    format!("file:{}:", image_id).into_bytes()
}

/// Encode a task row key: task:{batch_id}:{image_id}
pub fn encode_task_key(batch_id: &str, image_id: &str) -> Vec<u8> {
    format!("task:{}:{}", batch_id, image_id).into_bytes()
}

/// Encode a task prefix for range scan: task:{batch_id}:
pub fn encode_task_prefix(batch_id: &str) -> Vec<u8> {
    format!("task:{}:", batch_id).into_bytes()
}

/// Encode an album key: album:{album_id}
pub fn encode_album_key(album_id: &str) -> Vec<u8> {
    format!("album:{}", album_id).into_bytes()
}

/// Encode an album membership key: album_image:{album_id}:{image_id}
pub fn encode_album_image_key(album_id: &str, image_id: &str) -> Vec<u8> {
    format!("album_image:{}:{}", album_id, image_id).into_bytes()
}

/// Encode an album membership prefix: album_image:{album_id}:
pub fn encode_album_image_prefix(album_id: &str) -> Vec<u8> {
    format!("album_image:{}:", album_id).into_bytes()
}

/// Decode an album membership key -> (album_id, image_id)
pub fn decode_album_image_key(key: &[u8]) -> Option<(String, String)> {
    let key_str = std::str::from_utf8(key).ok()?;
    let (album_id, image_id) = key_str.strip_prefix("album_image:")?.split_once(':')?;
    Some((album_id.to_string(), image_id.to_string()))
}
