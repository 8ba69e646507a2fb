//! Argument binding: trailing invocation arguments to recipe parameters.

use super::error::BindError;
use super::types::*;

/// Bind trailing arguments to a recipe.
///
/// Recipes in positional-forwarding mode accept any number of arguments and
/// expose them unchanged as the forwarded list. Otherwise each declared
/// parameter consumes one argument in order, defaults fill omitted trailing
/// parameters, and a variadic parameter takes whatever remains.
pub fn bind(recipe: &Recipe, args: &[String]) -> Result<Bindings, BindError> {
    if recipe.positional {
        return Ok(Bindings {
            values: Default::default(),
            forwarded: Some(args.to_vec()),
        });
    }

    let mut bindings = Bindings::default();
    let mut remaining = args.iter();

    for param in &recipe.parameters {
        let value = match (remaining.next(), &param.default) {
            (Some(arg), _) => arg.clone(),
            (None, Some(default)) => default.clone(),
            (None, None) => {
                return Err(BindError::MissingArgument {
                    recipe: recipe.name.clone(),
                    parameter: param.name.clone(),
                    got: args.len(),
                    needed: recipe.min_arguments(),
                })
            }
        };
        bindings
            .values
            .insert(param.name.clone(), BoundValue::Single(value));
    }

    let rest: Vec<String> = remaining.cloned().collect();
    match &recipe.variadic {
        Some(name) => {
            bindings
                .values
                .insert(name.clone(), BoundValue::Variadic(rest));
        }
        None if !rest.is_empty() => {
            return Err(BindError::TooManyArguments {
                recipe: recipe.name.clone(),
                max: recipe.parameters.len(),
                got: args.len(),
            })
        }
        None => {}
    }

    tracing::debug!(recipe = %recipe.name, bound = bindings.values.len(), "bound arguments");
    Ok(bindings)
}
