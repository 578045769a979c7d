use camino::Utf8Path;

use crate::tree::{Contents, Slot, Tree};

/// Render `tree` as a markdown outline rooted at `base`.
pub fn render(base: &Utf8Path, tree: &Tree) -> String {
    let mut output = String::from("# Layout\n\n");

    let root_name = base.file_name().unwrap_or(base.as_str());
    output.push_str(&format!("- 📁 **{}/**\n", root_name));

    walk_tree(tree, &mut output, 1);
    output
}

fn walk_tree(tree: &Tree, output: &mut String, depth: usize) {
    let indent = "  ".repeat(depth);

    for (slot, contents) in tree.entries() {
        // Current-slot contents stay at this depth.
        let child_depth = match slot {
            Slot::Current => depth,
            Slot::Named(name) => {
                output.push_str(&format!("{}- 📁 **{}/**\n", indent, name));
                depth + 1
            }
        };

        match contents {
            Contents::Branch(child) => walk_tree(child, output, child_depth),
            Contents::Files(files) => {
                let file_indent = "  ".repeat(child_depth);
                for file in files {
                    output.push_str(&format!("{}- 📄 **{}**\n", file_indent, file));
                }
            }
        }
    }
}
