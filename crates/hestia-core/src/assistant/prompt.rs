use serde::Serialize;

use crate::bundle::Bundle;
use crate::model::{InventoryItem, Notification, Persona, Recipe, Task};
use crate::notify::NotificationFeed;

/// Application state the assistant sees on every turn.
#[derive(Debug, Clone, Serialize)]
pub struct AssistantContext<'a> {
    pub tasks: &'a [Task],
    pub inventory: &'a [InventoryItem],
    pub recipes: &'a [Recipe],
    pub notifications: Vec<&'a Notification>,
}

impl<'a> AssistantContext<'a> {
    pub fn new(bundle: &'a Bundle, feed: &'a NotificationFeed) -> Self {
        Self {
            tasks: &bundle.tasks,
            inventory: &bundle.inventory,
            recipes: &bundle.recipes,
            notifications: feed.iter().collect(),
        }
    }

    pub fn to_json(&self) -> String {
        // Plain structs of strings and numbers always serialize.
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

pub fn system_instruction(persona: Persona, context_json: &str) -> String {
    let mut out = String::new();
    out.push_str("Eres HESTIA, una inteligencia artificial avanzada inspirada en JARVIS.\n");
    out.push_str(
        "Tu objetivo es ayudar al usuario con su gestión de tareas, inventario y recetas.\n",
    );
    out.push_str(&format!(
        "Actualmente el usuario tiene el perfil de: {}.\n",
        persona.label()
    ));
    out.push_str("Adapta tu tono y sugerencias a este perfil:\n");
    for p in Persona::ALL {
        out.push_str(&format!("- {}: {}\n", p.label(), p.focus()));
    }
    out.push('\n');
    out.push_str(&format!("Contexto actual de la aplicación: {context_json}\n"));
    out.push('\n');
    out.push_str(
        "Responde de forma concisa, inteligente y útil. Usa Markdown para formatear si es necesario.",
    );
    out
}
