use std::fs;
use std::path::PathBuf;

/// Read a hex dump from `tests/packet_examples`.
pub fn file_to_packet(fname: &str) -> Vec<u8> {
    // The test is executed under the crate root directory.
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("packet_examples");
    path.push(fname);

    let content = fs::read_to_string(&path).unwrap();
    let content: String = content.split_whitespace().collect();
    hex::decode(content).unwrap()
}
