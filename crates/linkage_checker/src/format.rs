use crate::problem::LinkageProblem;
use crate::symbol::ClassFile;
use indexmap::{IndexMap, IndexSet};
use linkage_deps::{ClassPathEntry, ClassPathResult};

/// Renders problems for people, grouped by description.
///
/// Groups are sorted by description. Each lists the distinct top-level classes referencing the
/// symbol together with any causes, then where every implicated classpath entry sits in the
/// dependency tree when `class_path` is given.
pub fn format_linkage_problems<'a, I>(problems: I, class_path: Option<&ClassPathResult>) -> String
where
    I: IntoIterator<Item = &'a LinkageProblem>,
{
    let mut groups: IndexMap<String, Vec<&LinkageProblem>> = IndexMap::new();
    for problem in problems {
        groups.entry(problem.describe()).or_default().push(problem);
    }
    groups.sort_keys();

    let mut output = String::new();
    for (description, members) in &groups {
        let mut sources: IndexMap<ClassFile, IndexSet<String>> = IndexMap::new();
        for problem in members {
            let causes = sources
                .entry(problem.source_class().top_level())
                .or_default();
            if let Some(cause) = problem.cause() {
                causes.insert(cause.to_string());
            }
        }

        output.push_str(&format!("{description};\n"));
        output.push_str(&format!(
            "  referenced by {}\n",
            counted(sources.len(), "class file")
        ));
        for (source, causes) in &sources {
            output.push_str(&format!("    {source}\n"));
            for cause in causes {
                output.push_str("    Cause:\n");
                for line in cause.lines() {
                    output.push_str(&format!("      {line}\n"));
                }
            }
        }

        let Some(class_path) = class_path else {
            continue;
        };
        let mut entries: IndexSet<&ClassPathEntry> = IndexSet::new();
        for problem in members {
            if let Some(target) = problem.target_class() {
                entries.insert(target.entry());
            }
        }
        for problem in members {
            entries.insert(problem.source_class().entry());
        }
        for entry in entries {
            let paths = class_path.dependency_paths(entry);
            let Some(first) = paths.first() else {
                continue;
            };
            output.push_str(&format!("  {entry} is at: {first}"));
            if paths.len() > 1 {
                output.push_str(&format!(
                    " and {}",
                    counted(paths.len() - 1, "other dependency path")
                ));
            }
            output.push('\n');
        }
    }
    output
}

fn counted(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}
