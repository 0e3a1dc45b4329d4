// Copyright (c) 2018-2025  Brendan Molloy <brendan@bbqsrc.net>,
//                          Ilya Solovyiov <ilya.solovyiov@gmail.com>,
//                          Kai Ren <tyranron@gmail.com>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Expansion of [Scenario Outline][0] [Examples][1] into concrete scenarios.
//!
//! [0]: https://cucumber.io/docs/gherkin/reference#scenario-outline
//! [1]: https://cucumber.io/docs/gherkin/reference#examples

use std::iter;

use lazy_regex::regex;

/// Concrete scenario produced from a single [`gherkin::Examples`] row.
#[derive(Clone, Debug)]
pub struct Expanded {
    /// 1-based number of the row across all the example groups of the
    /// outline.
    pub number: usize,

    /// Header-to-value pairs of the row.
    pub row: Vec<(String, String)>,

    /// Scenario with every known `<placeholder>` substituted.
    pub scenario: gherkin::Scenario,

    /// Placeholders having no matching column, left verbatim.
    pub unmatched: Vec<String>,
}

/// Expands the given `outline` into one [`Expanded`] scenario per row of each
/// of its [`gherkin::Examples`], grouped by the example group.
///
/// Substitution covers the scenario title, step text, step doc-strings and
/// step table cells. A `<placeholder>` with no column of the same name in the
/// header stays in the text as is, being collected into
/// [`Expanded::unmatched`].
#[must_use]
pub fn expand(outline: &gherkin::Scenario) -> Vec<Vec<Expanded>> {
    let mut number = 0;
    outline
        .examples
        .iter()
        .map(|examples| {
            let Some((header, rows)) =
                examples.table.as_ref().and_then(|t| t.rows.split_first())
            else {
                return Vec::new();
            };
            rows.iter()
                .enumerate()
                .map(|(id, values)| {
                    number += 1;
                    let row = header
                        .iter()
                        .cloned()
                        .zip(values.iter().cloned())
                        .collect::<Vec<_>>();
                    expand_row(outline, examples, id, number, row)
                })
                .collect()
        })
        .collect()
}

/// Expands a single `row` of the `examples`.
fn expand_row(
    outline: &gherkin::Scenario,
    examples: &gherkin::Examples,
    id: usize,
    number: usize,
    row: Vec<(String, String)>,
) -> Expanded {
    let mut unmatched = Vec::new();
    let mut replace = |text: &mut String| {
        *text = substitute(text, &row, &mut unmatched);
    };

    let mut scenario = outline.clone();
    scenario.examples = Vec::new();
    scenario.tags.extend(examples.tags.iter().cloned());
    // Rows of the same outline are distinguished by their position.
    scenario.position = examples.position;
    scenario.position.line += id + 2;

    replace(&mut scenario.name);
    for step in &mut scenario.steps {
        for value in iter::once(&mut step.value)
            .chain(step.docstring.iter_mut())
            .chain(
                step.table
                    .iter_mut()
                    .flat_map(|t| t.rows.iter_mut().flatten()),
            )
        {
            replace(value);
        }
    }

    unmatched.sort();
    unmatched.dedup();
    if !unmatched.is_empty() {
        tracing::warn!(
            outline = %outline.name,
            row = number,
            placeholders = ?unmatched,
            "outline placeholders have no matching examples column, \
             leaving them as literal text",
        );
    }

    Expanded { number, row, scenario, unmatched }
}

/// Replaces `<name>` placeholders in the `text` with the `row` values.
fn substitute(
    text: &str,
    row: &[(String, String)],
    unmatched: &mut Vec<String>,
) -> String {
    regex!(r"<([^>\s]+)>")
        .replace_all(text, |cap: &regex::Captures<'_>| {
            let whole = cap.get(0).map_or("", |m| m.as_str());
            let name = cap.get(1).map_or("", |m| m.as_str());
            row.iter().find(|(k, _)| k == name).map_or_else(
                || {
                    unmatched.push(name.to_owned());
                    whole.to_owned()
                },
                |(_, v)| v.clone(),
            )
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use gherkin::GherkinEnv;

    use super::*;

    fn outline() -> gherkin::Scenario {
        let feature = gherkin::Feature::parse(
            "Feature: Hungry\n\
             \n\
             \x20 Scenario Outline: eating <eat>\n\
             \x20   Given there are <start> cucumbers\n\
             \x20   When I eat <eat> cucumbers\n\
             \x20   Then I should have <left> cucumbers and <unknown>\n\
             \x20     | left   |\n\
             \x20     | <left> |\n\
             \n\
             \x20   @fast\n\
             \x20   Examples:\n\
             \x20     | start | eat | left |\n\
             \x20     |    12 |   5 |    7 |\n\
             \x20     |    20 |   4 |   16 |\n\
             \n\
             \x20   Examples:\n\
             \x20     | start | eat | left |\n\
             \x20     |     1 |   1 |    0 |\n",
            GherkinEnv::default(),
        )
        .unwrap();
        feature.scenarios[0].clone()
    }

    #[test]
    fn yields_one_scenario_per_row() {
        let groups = expand(&outline());

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[1].len(), 1);
        assert_eq!(
            groups.iter().flatten().map(|e| e.number).collect::<Vec<_>>(),
            vec![1, 2, 3],
        );
        for e in groups.iter().flatten() {
            assert_eq!(e.scenario.steps.len(), 3);
            assert!(e.scenario.examples.is_empty());
        }
    }

    #[test]
    fn substitutes_placeholders() {
        let groups = expand(&outline());
        let second = &groups[0][1].scenario;

        assert_eq!(second.name, "eating 4");
        assert_eq!(second.steps[0].value, "there are 20 cucumbers");
        assert_eq!(second.steps[1].value, "I eat 4 cucumbers");
        assert_eq!(
            second.steps[2].table.as_ref().unwrap().rows[1],
            vec!["16".to_owned()],
        );
        assert!(second.tags.contains(&"fast".to_owned()));
        assert!(!groups[1][0].scenario.tags.contains(&"fast".to_owned()));
    }

    #[test]
    fn leaves_unmatched_placeholders_verbatim() {
        let groups = expand(&outline());
        let first = &groups[0][0];

        assert_eq!(
            first.scenario.steps[2].value,
            "I should have 7 cucumbers and <unknown>",
        );
        assert_eq!(first.unmatched, vec!["unknown".to_owned()]);
    }
}
