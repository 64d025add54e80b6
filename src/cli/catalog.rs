//! `kdiag catalog`

use kdiag_core::HypothesisCatalog;

pub fn run() {
    print!("{}", render(&HypothesisCatalog::new()));
}

fn render(catalog: &HypothesisCatalog) -> String {
    let mut out = String::new();
    for entry in catalog.entries() {
        out.push_str(&format!(
            "{} (severity {:.1}, ease {:.1})\n",
            entry.category, entry.severity, entry.ease_of_validation
        ));
        out.push_str(&format!("  {}\n", entry.description_template));
        out.push_str(&format!("  indicators: {}\n", entry.indicators.join(", ")));
        out.push_str("  commands:\n");
        for template in entry.command_templates {
            out.push_str(&format!("    {}\n", template));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kdiag_core::HypothesisCategory;

    #[test]
    fn test_render_lists_every_category() {
        let text = render(&HypothesisCatalog::new());
        for category in HypothesisCategory::ALL {
            assert!(text.contains(&format!("{} (severity", category)));
        }
        assert!(text.contains("    kubectl top pod {pod_name} -n {namespace}"));
    }
}
