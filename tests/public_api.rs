use nercomp::{
    evaluate_aligned, evaluate_documents, markup_to_bio, merge_ground_truth, read_markup_lines,
    CategoryMap, ClassMetrics, DocumentInput, EvalConfig, EvalConfigBuilder, Label, ResponsePart,
    RunError, Runner, SpanEntity, SpanPrediction, TaggedToken, Token, TypeCounts,
};
use either::Either;
use quickcheck::{QuickCheck, TestResult};
use std::fs::File;
use std::io::BufReader;

pub trait CloseEnough {
    fn are_close(&self, other: &Self, eps: f32) -> bool;
}

// ClassMetrics does not have the default PartialEq implementation.
impl CloseEnough for ClassMetrics {
    fn are_close(&self, other: &Self, eps: f32) -> bool {
        let are_equal = self == other;
        let precision_is_equal = f32::abs(self.precision - other.precision) < eps;
        let recall_is_equal = f32::abs(self.recall - other.recall) < eps;
        let fscore_is_equal = f32::abs(self.fscore - other.fscore) < eps;
        are_equal && precision_is_equal && recall_is_equal && fscore_is_equal
    }
}

fn open(path: &str) -> BufReader<File> {
    BufReader::new(File::open(path).expect("fixture not found in tests/data"))
}

#[test]
fn tsv_sources_to_report() {
    let runner = Runner::default();
    let outcome = runner
        .run_tagged_sources(open("tests/data/gold.tsv"), open("tests/data/predicted.tsv"))
        .unwrap();
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.documents.len(), 2);
    let reporter = outcome.report(runner.config()).unwrap();
    // NOTE: Do not change the indentation
    let expected_report = "Class, Precision, Recall, Fscore, Support
GPE, 1, 1, 1, 2
ORG, 0, 0, 0, 1
PERSON, 1, 1, 1, 1
PRODUCT, 0, 0, 0, 0
Overall_Micro, 0.75, 0.75, 0.75, 4
Overall_Macro, 0.5, 0.5, 0.5, 4
Overall_Weighted, 0.75, 0.75, 0.75, 4\n";
    assert_eq!(reporter.to_string(), expected_report);
    let expected_micro = ClassMetrics {
        class: String::from("Overall_Micro"),
        average: nercomp::Average::Micro,
        precision: 0.75,
        recall: 0.75,
        fscore: 0.75,
        support: 4,
    };
    assert!(reporter
        .get("Overall_Micro")
        .unwrap()
        .are_close(&expected_micro, 1e-6));
}

#[test]
fn unaligned_document_fails_the_evaluation() {
    let document = |name: &str| {
        vec![
            TaggedToken::new(name, Label::begin("PER")),
            TaggedToken::new("sleeps", Label::Outside),
            TaggedToken::new("today", Label::Outside),
        ]
    };
    let gold = vec![document("Matti"), document("Liisa")];
    let predicted = vec![
        document("Matti"),
        vec![
            TaggedToken::new("xyz", Label::begin("PER")),
            TaggedToken::new("uvw", Label::Outside),
            TaggedToken::new("rst", Label::Outside),
        ],
    ];
    let actual = evaluate_documents(gold.clone(), predicted, &EvalConfig::default());
    match actual {
        Err(RunError::DocumentFailures(failures)) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].id, "1");
        }
        other => panic!("expected a document failure, got {:?}", other.map(|r| r.to_string())),
    }
    let reporter = evaluate_documents(gold.clone(), gold, &EvalConfig::default()).unwrap();
    assert_eq!(reporter.get("PER").unwrap().support, 2);
}

#[test]
fn aligned_output_is_evaluated_identically() {
    let runner = Runner::default();
    let outcome = runner
        .run_tagged_sources(open("tests/data/gold.tsv"), open("tests/data/predicted.tsv"))
        .unwrap();
    let mut written = Vec::new();
    outcome.write_aligned(&mut written, runner.config()).unwrap();
    let written = String::from_utf8(written).unwrap();
    // NOTE: Do not change the indentation
    let expected = "-DOCSTART-\tO\tO
Tarja\tB-PERSON\tB-PERSON
Halonen\tI-PERSON\tI-PERSON
vieraili\tO\tO
New\tB-GPE\tB-GPE
Yorkissa\tI-GPE\tI-GPE
.\tO\tO
-DOCSTART-\tO\tO
Nokia\tB-ORG\tB-PRODUCT
julkaisi\tO\tO
uuden\tO\tO
puhelimen\tO\tO
Espoossa\tB-GPE\tB-GPE
.\tO\tO
";
    assert_eq!(written, expected);
    let reread = evaluate_aligned(written.as_bytes(), runner.config()).unwrap();
    assert_eq!(reread, outcome.evaluator);
    assert_eq!(reread.counts("ORG"), TypeCounts::new(0, 0, 1));
    assert_eq!(reread.counts("PRODUCT"), TypeCounts::new(0, 1, 0));
}

#[test]
fn span_tagger_over_three_sub_documents() {
    let config = EvalConfigBuilder::default()
        .max_sub_document_len(14)
        .build()
        .unwrap();
    let text = "Tarja Halonen\nasuu\nHelsingissä";
    let tokens = vec![
        Token::new("Tarja", 0),
        Token::new("Halonen", 6),
        Token::new("asuu", 14),
        Token::new("Helsingissä", 19),
    ];
    let prediction = SpanPrediction::for_text("doc", text, tokens, &config);
    let ids: Vec<&str> = prediction
        .sub_documents
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(ids, vec!["doc.1", "doc.2", "doc.3"]);
    let response = |id: &str, entities: Vec<SpanEntity>| ResponsePart {
        id: String::from(id),
        is_error: false,
        entities,
    };
    let prediction = prediction.with_responses(vec![
        response("doc.1", vec![SpanEntity::new(0, 13, "Person", 0.99)]),
        response("doc.2", vec![]),
        response(
            "doc.3",
            vec![SpanEntity::new(0, 11, "Location", 0.7).with_subcategory("GPE")],
        ),
    ]);
    let gold = vec![
        TaggedToken::new("Tarja", Label::begin("PERSON")),
        TaggedToken::new("Halonen", Label::inside("PERSON")),
        TaggedToken::new("asuu", Label::Outside),
        TaggedToken::new("Helsingissä", Label::begin("GPE")),
    ];
    let runner = Runner::new(config, CategoryMap::span_tagger().unwrap());
    let outcome = runner.run(&[DocumentInput::new("doc", gold, Either::Right(prediction))]);
    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.evaluator.counts("PERSON"), TypeCounts::new(1, 0, 0));
    assert_eq!(outcome.evaluator.counts("GPE"), TypeCounts::new(1, 0, 0));
    assert_eq!(outcome.evaluator.overall(), TypeCounts::new(2, 0, 0));
}

#[test]
fn markup_tagger_output() {
    let output = "Tarja\t<EnamexPrsHum>\nHalonen\t</EnamexPrsHum>\nvieraili\nTampereella\t<EnamexLocPpl/>\n";
    let categories = CategoryMap::markup_tagger().unwrap();
    let predicted = markup_to_bio("doc", read_markup_lines(output, '\t'), &categories);
    let gold = vec![
        TaggedToken::new("Tarja", Label::begin("PERSON")),
        TaggedToken::new("Halonen", Label::inside("PERSON")),
        TaggedToken::new("vieraili", Label::Outside),
        TaggedToken::new("Tampereella", Label::begin("GPE")),
    ];
    assert_eq!(predicted, gold);
    let outcome = Runner::default().run(&[DocumentInput::tagged("doc", gold, predicted)]);
    let reporter = outcome.report(&EvalConfig::default()).unwrap();
    assert_eq!(reporter.get("Overall_Micro").unwrap().fscore, 1.0);
}

#[test]
fn parallel_and_sequential_runs_agree() {
    let documents: Vec<DocumentInput> = (0..40)
        .map(|n| {
            let gold = vec![
                TaggedToken::new(format!("name{}", n), Label::begin("PERSON")),
                TaggedToken::new(format!("surname{}", n), Label::inside("PERSON")),
                TaggedToken::new("visited", Label::Outside),
                TaggedToken::new(format!("city{}", n), Label::begin("GPE")),
            ];
            let city = if n % 3 == 0 { Label::begin("LOC") } else { Label::begin("GPE") };
            let predicted = vec![
                TaggedToken::new(format!("name{} surname{}", n, n), Label::begin("PERSON")),
                TaggedToken::new("visited", Label::Outside),
                TaggedToken::new(format!("city{}", n), city),
            ];
            DocumentInput::tagged(n.to_string(), gold, predicted)
        })
        .collect();
    let sequential = Runner::default().run(&documents);
    let config = EvalConfigBuilder::default().parallel(true).build().unwrap();
    let parallel = Runner::new(config, CategoryMap::default()).run(&documents);
    assert_eq!(sequential.evaluator, parallel.evaluator);
    assert_eq!(sequential.documents, parallel.documents);
    assert_eq!(sequential.evaluator.documents(), 40);
    assert_eq!(sequential.evaluator.counts("PERSON"), TypeCounts::new(40, 0, 0));
    assert_eq!(sequential.evaluator.counts("LOC"), TypeCounts::new(0, 14, 0));
    assert_eq!(sequential.evaluator.counts("GPE"), TypeCounts::new(26, 0, 14));
}

#[test]
fn propertie_merged_predictions_keep_gold_tokens() {
    fn property(kinds: Vec<u8>, merges: Vec<bool>) -> TestResult {
        let gold: Vec<TaggedToken> = kinds
            .iter()
            .take(50)
            .enumerate()
            .map(|(i, kind)| {
                let label = match kind % 3 {
                    0 => Label::Outside,
                    1 => Label::begin("PER"),
                    _ => Label::begin("LOC"),
                };
                TaggedToken::new(format!("w{}", i), label)
            })
            .collect();
        let mut predicted = Vec::new();
        let mut i = 0;
        while i < gold.len() {
            if merges.get(i).copied().unwrap_or(false) && i + 1 < gold.len() {
                let text = format!("{}{}", gold[i].text, gold[i + 1].text);
                predicted.push(TaggedToken::new(text, gold[i].label.clone()));
                i += 2;
            } else {
                predicted.push(gold[i].clone());
                i += 1;
            }
        }
        let merged = match merge_ground_truth("prop", &predicted, &gold, 9) {
            Ok(merged) => merged,
            Err(_) => return TestResult::failed(),
        };
        let same_text = merged
            .tokens
            .iter()
            .zip(gold.iter())
            .all(|(m, g)| m.text == g.text && m.gold == g.label);
        TestResult::from_bool(merged.tokens.len() == gold.len() && same_text)
    }
    QuickCheck::new()
        .tests(200)
        .quickcheck(property as fn(Vec<u8>, Vec<bool>) -> TestResult);
}
