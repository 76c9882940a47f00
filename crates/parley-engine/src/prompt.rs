// Prompt construction for suggestion requests.
//
// Renders the conversation transcript, the service context and any
// historical cases into one instruction block asking the reasoning provider
// for a JSON-only answer.

use parley_core::model::{
    ActionType, CaseExample, Conversation, Message, ServiceContext, SuggestionRequest,
};

// ---------------------------------------------------------------------------
// System prompt
// ---------------------------------------------------------------------------

/// Static system prompt sent with every suggestion request.
pub fn system_prompt() -> String {
    "Tu es un assistant commercial pour une place de marché de services entre particuliers \
     et prestataires. Tu aides le prestataire à répondre à ses clients de façon claire, \
     courtoise et orientée vers la conclusion de la prestation. Tu réponds toujours en \
     français et uniquement dans le format demandé."
        .to_string()
}

// ---------------------------------------------------------------------------
// Request assembly
// ---------------------------------------------------------------------------

/// Render messages as `<ROLE>: <text>` lines in their original order.
pub fn format_transcript(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.sender.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_request(conversation: &Conversation, cases: Vec<CaseExample>) -> SuggestionRequest {
    SuggestionRequest {
        transcript: format_transcript(&conversation.messages),
        service_context: ServiceContext::from_demand(&conversation.demand),
        cases,
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Build the full instruction block for `request`.
///
/// The similar-cases section is present only when there are cases.
pub fn render_prompt(request: &SuggestionRequest) -> String {
    let mut prompt = String::with_capacity(1024 + request.transcript.len());

    // Section 1: SERVICE CONTEXT
    let ctx = &request.service_context;
    prompt.push_str(&format!(
        "## CONTEXTE DU SERVICE\n\
         Catégorie : {}\n\
         Description : {}\n\
         Statut : {}\n\n",
        ctx.label, ctx.description, ctx.status,
    ));

    // Section 2: CONVERSATION
    prompt.push_str("## CONVERSATION\n");
    if request.transcript.is_empty() {
        prompt.push_str("(aucun message)\n\n");
    } else {
        prompt.push_str(&request.transcript);
        prompt.push_str("\n\n");
    }

    // Section 3: SIMILAR CASES
    if !request.cases.is_empty() {
        prompt.push_str(
            "## CAS SIMILAIRES (inspiration)\n\
             Réponses de prestataires ayant mené à une prestation réalisée dans la même catégorie :\n",
        );
        for (i, case) in request.cases.iter().enumerate() {
            prompt.push_str(&format!(
                "Cas {}\n  Question du client : {}\n  Réponse efficace : {}\n",
                i + 1,
                case.transcript_excerpt,
                case.effective_reply,
            ));
        }
        prompt.push('\n');
    }

    // Section 4: INSTRUCTIONS
    let actions = ActionType::ALL
        .iter()
        .map(|a| a.as_str())
        .collect::<Vec<_>>()
        .join(" | ");
    prompt.push_str(&format!(
        "## INSTRUCTIONS\n\
         1. Identifie le sujet principal de la conversation.\n\
         2. Identifie les questions du client restées sans réponse.\n\
         3. Recommande la prochaine action du prestataire.\n\
         4. Rédige la réponse que le prestataire peut envoyer.\n\
         \n\
         Réponds UNIQUEMENT avec un objet JSON, sans texte autour, de la forme :\n\
         {{\"analysis\": \"<sujet et questions en suspens>\", \
         \"suggestion\": \"<réponse à envoyer>\", \
         \"actionType\": \"<{actions}>\", \
         \"confidence\": <entier entre 0 et 100>}}\n\
         actionType doit être exactement l'une des valeurs : {actions}.\n\
         confidence est un entier entre 0 et 100 exprimant ta certitude que la suggestion est pertinente."
    ));

    prompt
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
