//! Scoring prompt construction.

use serde_json::Value;

/// Instructions sent ahead of the documents. Kept in French, the language of
/// the tenders and of the expected report.
pub const PREAMBLE: &str = "Tu es une IA qui doit générer un rapport sur un appel d'offres. \
L'appel d'offres est fourni sous forme de documents PDF. \
Tu peux en recevoir plusieurs à la fois, et un document peut aussi être une annexe ou un index du document principal. \
Tu recevras aussi un fichier Excel : contente-toi de l'analyser. \
N'invente rien : tire uniquement des conclusions de ce que tu observes. \
Je t'envoie un JSON avec la liste des critères : tu dois donner à chacun une note sur 20, \
expliquer la raison de ta décision ou ajouter un commentaire, et indiquer le code couleur de la note, \
rouge pour 0 et vert pour 20. \
Tu me rends un JSON sous ce format.";

/// Build the scoring prompt from extracted document text and the criteria exemplar.
///
/// The text is passed through unbounded; the exemplar is pretty-printed with
/// two-space indentation and non-ASCII characters kept as-is.
pub fn build_prompt(document_text: &str, criteria: &Value) -> String {
    // Serializing a `Value` cannot fail.
    let exemplar = serde_json::to_string_pretty(criteria).unwrap_or_else(|_| criteria.to_string());
    format!(
        "{}\n\nVoici le texte extrait des PDF :\n{}\n\nVoici un exemple de format de réponse :\n{}",
        PREAMBLE, document_text, exemplar
    )
}
