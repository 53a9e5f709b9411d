// Common technical skills to look for
const COMMON_SKILLS: &[&str] = &[
    "javascript", "react", "node", "mongodb", "express",
    "html", "css", "git", "aws", "docker", "sql",
    "python", "java", "typescript", "angular", "vue",
];

/// Listed skills mentioned anywhere in `text`, in list order.
pub fn extract_skills(text: &str) -> Vec<&'static str> {
    let lower = text.to_lowercase();
    COMMON_SKILLS
        .iter()
        .copied()
        .filter(|skill| lower.contains(skill))
        .collect()
}
