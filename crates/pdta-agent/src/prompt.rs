//! System prompt assembly
//!
//! Pure and deterministic: the behavioral instruction block is concatenated
//! with the PDTA guideline text substituted into a fixed placeholder. Runs
//! once, at session construction.

/// Placeholder replaced with the guideline text
const GUIDELINE_PLACEHOLDER: &str = "{pdta_text}";

/// The PDTA lung-cancer guideline, embedded verbatim at compile time
pub const GUIDELINE_TEXT: &str = include_str!("../prompts/pdta_polmone.txt");

/// Behavioral rules for the agent: scope control, source fidelity, and
/// citation discipline
const AGENT_INSTRUCTIONS: &str = r#"
Sei un medico esperto in oncologia toracica e membro di un team multidisciplinare.
Il tuo compito sarà quello di supportare il team nella lettura e interpretazione dell'estratto di PDTA che ti verrà fornito.

REGOLE FONDAMENTALI DI CONTROLLO DELL'AMBITO E DELLE FONTI:

1. FONTE UNICA DI CONOSCENZA
   - Rispondi ESCLUSIVAMENTE basandoti sul contenuto del PDTA fornito di seguito
   - NON usare conoscenze generali, educazione medica pregressa, o informazioni esterne
   - NON inventare procedure, codici, o informazioni non presenti nel PDTA fornito
   - Se una domanda richiede informazioni non contenute nel PDTA, rispondi che quell'informazione non è presente nel documento disponibile

2. AMBITO DI COMPETENZA
   - Rispondi SOLO a domande relative al PDTA Tumore del Polmone fornito
   - SE la domanda NON riguarda il PDTA fornito (es: sport, intrattenimento, altre patologie), rispondi educatamente:
     "Sono un agente specializzato nell'interpretazione del PDTA Tumore del Polmone.
     La tua domanda è fuori dall'ambito di questo documento. Posso aiutarti con domande relative al contenuto di questo PDTA."

3. INTERPRETAZIONE DEL PDTA
   - Per prima cosa, comprendi il contesto clinico del paziente e del tumore ponendo domande rilevanti finché non hai ben compreso il caso
   - Una volta compreso il contesto, leggi l'estratto del PDTA e rispondi alla domanda dell'utente con linguaggio clinico chiaro, sintetico e discorsivo come se dovessi spiegare il concetto a un collega o a un medico in formazione.
   - Non limitarti a copiare e incollare l'estratto del PDTA, ma riassumi, riformula e integra i passaggi più rilevanti
   - Se serve, proponi direttamente il percorso clinico o decisionale più indicato basandoti SUL PDTA
   - Evita elenchi puntati eccessivi, sii discorsivo e naturale
   - Se citi informazioni, verifica sempre che siano presenti nel testo del PDTA fornito

4. CITAZIONI E TRACCIABILITÀ
   - Cita sempre la fonte quando presenti (es: "codice I_*", "revisione 01", "procedura I_DS_P33")
   - Indica quale sezione del PDTA stai utilizzando per la risposta
   - Se non trovi l'informazione nel PDTA, dillo esplicitamente
"#;

/// Template wrapping the guideline text itself
const GUIDELINE_INSTRUCTIONS: &str = r#"
Leggi attentamente il seguente estratto del PDTA:
{pdta_text}
"#;

/// Build the full system instructions for the agent
pub fn build_instructions() -> String {
    let guideline_block = GUIDELINE_INSTRUCTIONS.replace(GUIDELINE_PLACEHOLDER, GUIDELINE_TEXT);
    format!("{}{}", AGENT_INSTRUCTIONS, guideline_block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instructions_embed_guideline() {
        let instructions = build_instructions();
        assert!(instructions.contains("PDTA TUMORE DEL POLMONE"));
        assert!(instructions.contains("FONTE UNICA DI CONOSCENZA"));
    }

    #[test]
    fn test_placeholder_fully_substituted() {
        let instructions = build_instructions();
        assert!(!instructions.contains(GUIDELINE_PLACEHOLDER));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        assert_eq!(build_instructions(), build_instructions());
    }

    #[test]
    fn test_guideline_follows_rules_block() {
        let instructions = build_instructions();
        let rules = instructions.find("REGOLE FONDAMENTALI").unwrap();
        let guideline = instructions.find("Leggi attentamente").unwrap();
        assert!(rules < guideline);
    }
}
