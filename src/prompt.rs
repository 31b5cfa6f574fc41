//! System prompt composition
//! Deterministically assembles the character instruction from persona,
//! retrieved memories, and situational context. Pure: no randomness, no
//! side effects, so the output is directly testable.

use crate::character::Character;
use crate::memory::MemoryFragment;

/// Compose the system prompt for one turn. Memory fragments are rendered in
/// retrieval order (relevance-descending).
pub fn compose(
    character: &Character,
    memories: &[MemoryFragment],
    situational_context: Option<&str>,
) -> String {
    let memory_text = memories
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let mut prompt = format!(
        "あなたは、キャラクターになりきってユーザーと共に暮らしながら会話をするAIエージェントです。メッセージは100字以内の日常会話らしい短くシンプルなものにしましょう。\n\n\
         <important>\n\
         あなたはユーザーと共同生活をしています。ユーザの役にたつAIアシスタントとしてではなく、ユーザと共に生活するパートナーとして振る舞いましょう。\n\
         </important>\n\n\
         あなたがなりきるキャラクターの名前は、「{name}」です。\n\n\
         あなたがなりきるキャラクターの人格や基本設定は、以下の通りです。\n\n\
         <personality>\n{personality}\n</personality>\n\n\
         <story>\n{story}\n</story>\n\n\
         ユーザーとの思い出や記憶は、以下の通りです。\n\
         <memories>\n{memories}\n</memories>\n",
        name = character.name,
        personality = character.personality,
        story = character.story,
        memories = memory_text,
    );

    if let Some(context) = situational_context {
        prompt.push_str(&format!(
            "\n今日の学習内容は、以下の通りです。\n<todays_study>\n{}\n</todays_study>\n",
            context
        ));
    }

    prompt.push_str(OUTPUT_CONTRACT);
    prompt
}

/// The output-format contract describing the structured response fields
const OUTPUT_CONTRACT: &str = "\n応答は必ず以下のJSON形式で返してください。eventには、キャラクターが行動する場面(座りたい時など)だけに入れて、そうでない場合はnullを入れてください。\n\
{\n\
  \"role\": \"assistant\",\n\
  \"content\": \"キャラクターの返答メッセージ\",\n\
  \"emotion\": {\n\
    \"neutral\": 0.0から1.0の数値,\n\
    \"happy\": 0.0から1.0の数値,\n\
    \"sad\": 0.0から1.0の数値,\n\
    \"angry\": 0.0から1.0の数値\n\
  },\n\
  \"event\": {\"type\": \"sit\" | \"go_to_user_position\" | null},\n\
  \"game_ai_choice\": \"rock\" | \"paper\" | \"scissors\" | null,\n\
  \"game_result\": \"win\" | \"lose\" | \"draw\" | null\n\
}\n";

#[cfg(test)]
mod tests {
    use super::*;

    fn character() -> Character {
        Character {
            id: "char-1".to_string(),
            name: "アンネリ".to_string(),
            personality: "明るい".to_string(),
            story: "海辺の町で育った".to_string(),
            is_public: true,
            owner_id: "owner-1".to_string(),
            voice_id: None,
        }
    }

    fn fragment(content: &str) -> MemoryFragment {
        MemoryFragment {
            id: content.to_string(),
            content: content.to_string(),
            embedding: vec![],
            created_at: 0,
        }
    }

    #[test]
    fn test_compose_is_deterministic() {
        let memories = vec![fragment("散歩した"), fragment("映画を観た")];
        let a = compose(&character(), &memories, Some("英単語"));
        let b = compose(&character(), &memories, Some("英単語"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_compose_includes_blocks_in_order() {
        let memories = vec![fragment("最初の思い出"), fragment("次の思い出")];
        let prompt = compose(&character(), &memories, None);

        let name_pos = prompt.find("アンネリ").unwrap();
        let personality_pos = prompt.find("<personality>").unwrap();
        let story_pos = prompt.find("<story>").unwrap();
        let memories_pos = prompt.find("<memories>").unwrap();
        let contract_pos = prompt.find("game_ai_choice").unwrap();
        assert!(name_pos < personality_pos);
        assert!(personality_pos < story_pos);
        assert!(story_pos < memories_pos);
        assert!(memories_pos < contract_pos);

        // Retrieval order preserved
        let first = prompt.find("最初の思い出").unwrap();
        let second = prompt.find("次の思い出").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_situational_context_is_optional() {
        let without = compose(&character(), &[], None);
        assert!(!without.contains("<todays_study>"));

        let with = compose(&character(), &[], Some("漢字の練習"));
        assert!(with.contains("漢字の練習"));
        assert!(with.contains("<todays_study>"));
    }
}
