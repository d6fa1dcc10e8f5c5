//! Prompt template for turning minutes text into a voting record.
//!
//! Used by [`crate::pipeline::llm`]. The rule that an unlisted vote counts as
//! "Sim" is a domain convention of these minutes: they only record dissent
//! and absence explicitly.

/// The inference rule for members whose vote the text does not state.
pub const IMPLICIT_VOTE_RULE: &str = "IMPORTANTE: Se um vereador é listado como participante da votação, \
mas seu voto não é explicitamente declarado como 'contrário' ou 'ausente', você deve inferir que o voto dele foi 'Sim'.";

const TEMPLATE_HEAD: &str = r#"Você é um assistente especializado em analisar documentos legislativos.
O texto a seguir é a ata de uma sessão da câmara de vereadores.
O identificador desta ata é "{ata_id}". Copie-o exatamente no campo "ata_id".

Extraia os metadados da sessão e, para CADA evento de votação, as seguintes informações:

1. `objeto_da_votacao`: Uma breve descrição do que foi votado (ex: "Aprovação do Projeto de Lei", "Pedido de urgência referente ao Ofício X").
2. `projetos_relacionados`: Uma lista contendo o ID de TODOS os Projetos de Lei (PLs), Projetos de Decreto Legislativo (PDLs) ou similares mencionados em relação a essa votação.
3. `resumo`: Um pequeno resumo claro, objetivo e de fácil entendimento geral sobre o assunto votado.
4. `resultado`: O resultado da votação (ex: "Aprovado", "Rejeitado").
5. `votos`: Uma lista detalhada de como cada vereador votou. "#;

const TEMPLATE_TAIL: &str = r#"

Retorne sua resposta APENAS como um único objeto JSON com a seguinte estrutura:
{
  "metadata_ata": {
    "ata_id": "string",
    "titulo_sessao": "string",
    "data_sessao": "YYYY-MM-DD",
    "numero_sessao": 0,
    "tipo_sessao": "string"
  },
  "votacoes": [
    {
      "objeto_da_votacao": "string",
      "projetos_relacionados": ["string"],
      "resumo": "string",
      "resultado": "string",
      "votos": [
        { "vereador": "string", "voto": "string" }
      ]
    }
  ]
}

Aqui está o texto para análise:
"#;

/// Build the full prompt for one document.
///
/// `ata_id` is inserted verbatim so the model can echo it back into
/// `metadata_ata.ata_id`.
pub fn voting_record_prompt(text: &str, ata_id: &str) -> String {
    let mut prompt = String::with_capacity(
        TEMPLATE_HEAD.len() + IMPLICIT_VOTE_RULE.len() + TEMPLATE_TAIL.len() + text.len() + 64,
    );
    prompt.push_str(&TEMPLATE_HEAD.replace("{ata_id}", ata_id));
    prompt.push_str(IMPLICIT_VOTE_RULE);
    prompt.push_str(TEMPLATE_TAIL);
    prompt.push_str(text);
    prompt
}
