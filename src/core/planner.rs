//! Plan generation: resolve, bind and render before anything launches.
//!
//! Everything that can fail before a process launches happens here, so a
//! plan handed to the executor is fully rendered.

use super::binder;
use super::error::Error;
use super::resolver;
use super::template::join_quoted;
use super::types::*;

/// Build the execution plan for one invocation.
///
/// Only the invoked recipe receives the invocation's arguments; every
/// prerequisite is bound with none and falls back to its own defaults.
pub fn plan<'a>(store: &'a RecipeStore, invocation: &Invocation) -> Result<ExecutionPlan<'a>, Error> {
    let order = resolver::resolve(store, &invocation.recipe)?;
    let last = order.len().saturating_sub(1);

    let mut steps = Vec::with_capacity(order.len());
    for (i, recipe) in order.into_iter().enumerate() {
        let args: &[String] = if i == last { &invocation.args } else { &[] };
        let bindings = binder::bind(recipe, args)?;
        let commands = render(recipe, &bindings);
        steps.push(PlanStep {
            recipe,
            bindings,
            commands,
        });
    }

    let plan = ExecutionPlan {
        root: invocation.recipe.clone(),
        steps,
    };
    tracing::debug!(
        root = %plan.root,
        recipes = ?plan.recipe_names(),
        lines = plan.line_count(),
        "planned invocation"
    );
    Ok(plan)
}

/// Render a recipe's lines against its bindings. Forwarded arguments that
/// no line interpolates with `{{@}}` are appended to the final line.
pub fn render(recipe: &Recipe, bindings: &Bindings) -> Vec<RenderedCommand> {
    let mut commands: Vec<RenderedCommand> = recipe
        .lines
        .iter()
        .map(|line| RenderedCommand {
            command: line.template.render(bindings),
            echo: line.echo,
            line: line.line,
        })
        .collect();

    if let Some(ref forwarded) = bindings.forwarded {
        if !forwarded.is_empty() && !recipe.interpolates_forwarded() {
            match commands.last_mut() {
                Some(last) => {
                    last.command.push(' ');
                    last.command.push_str(&join_quoted(forwarded));
                }
                None => tracing::warn!(
                    recipe = %recipe.name,
                    "recipe has no command lines; forwarded arguments are ignored"
                ),
            }
        }
    }

    commands
}

/// Human-readable description of a plan, one recipe per line.
pub fn describe(plan: &ExecutionPlan) -> Vec<String> {
    let mut out = Vec::new();
    for (i, step) in plan.steps.iter().enumerate() {
        let marker = if step.recipe.name == plan.root { "*" } else { " " };
        out.push(format!(
            "{} {}. {} ({} line{})",
            marker,
            i + 1,
            step.recipe.name,
            step.commands.len(),
            if step.commands.len() == 1 { "" } else { "s" }
        ));
        for cmd in &step.commands {
            out.push(format!("       {}", cmd.command));
        }
    }
    out
}
