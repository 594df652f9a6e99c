use afl::fuzz;

use xmlpick::{Document, Mode, Path};

fn main() {
    fuzz!(|data: &[u8]| {
        if let Ok(doc) = Document::from_bytes(data) {
            for text in &["root", "feed/entry[1]/link@href", "a/b[2]"] {
                if let Ok(path) = Path::parse(text) {
                    let _ = path.select(doc.root_element(), Mode::Shallow);
                    let _ = path.select(doc.root_element(), Mode::Recursive);
                }
            }
        }
    });
}
