//! Prompt builders for the two-stage narration protocol.
//!
//! Both stages demand the same reply shape: a single JSON object whose only
//! field is `inner_monologue`. The text itself is in Chinese because the
//! affirmation corpus and the target literary register are Chinese.

pub struct NarrationPrompts;

impl NarrationPrompts {
    /// Stage 1: draft a ~500-character first-person inner monologue for the
    /// affirmation.
    pub fn draft(affirmation: &str) -> String {
        format!(
            r#"自我肯定语：{affirmation}

请仿照萨提亚的《当我真的愿意看见自己时》的风格，为输入的自我肯定语生成一段内心旁白。
注意适当换行以减少读者的阅读难度。分三到四段生成内心旁白。不要写诗。
约500字。
必须以第一人称叙述。

请严格按照以下 JSON 格式返回数据：
{{
  "inner_monologue": "这里是生成的内心旁白内容"
}}"#
        )
    }

    /// Stage 2: ask the model to critique and rewrite its own draft.
    pub fn critique(narration: &str) -> String {
        format!(
            r#"针对上一次生成的内心旁白：
{narration}

请检查并优化以下内容：
- 修正标点/空格问题
- 改善语句通顺度
- 统一人称（第一人称），必须以第一人称叙述。
- 删除外语内容
- 防止场景过于具体
- 确保500字长度
- 删除奇怪比喻
- 修正语病/错别字

直接返回优化后的JSON：
{{
    "inner_monologue": "这里是修改后生成的内心旁白内容"
}}"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draft_embeds_affirmation() {
        let prompt = NarrationPrompts::draft("我值得被爱");
        assert!(prompt.contains("我值得被爱"));
        assert!(prompt.contains("inner_monologue"));
        assert!(prompt.contains("第一人称"));
    }

    #[test]
    fn test_critique_embeds_narration() {
        let prompt = NarrationPrompts::critique("一段旁白");
        assert!(prompt.contains("一段旁白"));
        assert!(prompt.contains("inner_monologue"));
    }
}
