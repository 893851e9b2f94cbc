//! Renders the system/user message pair sent to a provider for one phase.
//!
//! Phase behavior is a content policy, not a hard-coded prose recipe, but
//! each phase still has a fixed role to play; these templates encode that
//! role while leaving the actual rewriting to the provider.

use alchemy_core::Phase;

fn phase_role(phase: Phase) -> &'static str {
    match phase {
        Phase::PrimaMateria => {
            "You extract and restructure a raw idea into a well-formed prompt \
             skeleton: identify the underlying intent, fill obvious gaps, and \
             organize it into clear sections. Do not polish prose yet."
        }
        Phase::Solutio => {
            "You rewrite a structured prompt skeleton into natural, \
             human-readable flow while preserving every requirement it \
             contains."
        }
        Phase::Coagulatio => {
            "You tighten a prompt into a precise, production-ready form: \
             remove redundancy, sharpen instructions, and keep it as short \
             as the requirements allow."
        }
    }
}

/// Builds the `(system, user)` message pair for one phase call.
pub fn render(
    phase: Phase,
    current_input: &str,
    persona: Option<&str>,
    target_model: Option<&str>,
    accumulated_context: Option<&str>,
) -> (String, String) {
    let mut system = phase_role(phase).to_string();
    if let Some(persona) = persona {
        system.push_str("\n\nAdopt this persona when writing: ");
        system.push_str(persona);
    }
    if let Some(target_model) = target_model {
        system.push_str("\n\nThe resulting prompt will be sent to: ");
        system.push_str(target_model);
    }

    let mut user = String::new();
    if let Some(context) = accumulated_context {
        user.push_str("Relevant prior context:\n");
        user.push_str(context);
        user.push_str("\n\n");
    }
    user.push_str("Input to refine:\n");
    user.push_str(current_input);

    (system, user)
}
