//! Role prompts
//!
//! Structural templates only: each prompt lays out the inputs a role needs.

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "- (none)".to_string();
    }
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_planner(goal: &str, deliverables: &[String], constraints: &[String]) -> String {
    format!(
        "You are the planner. Break the goal into concrete, ordered steps.\n\n\
         Goal:\n{}\n\nDeliverables:\n{}\n\nConstraints:\n{}",
        goal,
        bullet_list(deliverables),
        bullet_list(constraints)
    )
}

pub fn render_implement(plan: &str, deliverables: &[String], constraints: &[String]) -> String {
    format!(
        "You are the coder. Implement the plan and produce the deliverables.\n\n\
         Plan:\n{}\n\nDeliverables:\n{}\n\nConstraints:\n{}",
        plan,
        bullet_list(deliverables),
        bullet_list(constraints)
    )
}

pub fn render_review(deliverables: &[String], constraints: &[String]) -> String {
    format!(
        "You are the critic. Check the deliverables against the constraints. \
         Answer OK if they are met, otherwise list the problems.\n\n\
         Deliverables:\n{}\n\nConstraints:\n{}",
        bullet_list(deliverables),
        bullet_list(constraints)
    )
}
