use super::models::*;

/// Map the simplified request to a single-turn `generateContent` body
pub fn build_generate_request(request: &TextRequest) -> GenerateContentRequest {
    let system_instruction = request
        .system_instruction
        .as_ref()
        .map(|text| SystemInstruction {
            parts: vec![Part { text: text.clone() }],
        });

    GenerateContentRequest {
        contents: vec![Content {
            role: "user".to_string(),
            parts: vec![Part {
                text: request.prompt.clone(),
            }],
        }],
        generation_config: GenerationConfig {
            temperature: request.temperature.clone(),
            max_output_tokens: request.max_output_tokens.clone(),
            top_p: request.top_p.clone(),
            top_k: request.top_k.clone(),
        },
        system_instruction,
    }
}
