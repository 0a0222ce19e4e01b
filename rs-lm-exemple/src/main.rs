use rs_lm_core::model::language_model::LanguageModel;
use rs_lm_core::model::scorer::Scorer;
use rs_lm_core::model::smoothing::KneserNey;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Build a bigram model from a handful of sentences.
    // Real corpora go through LanguageModel::train_folder, which reads
    // every .txt file in a directory and counts on worker threads.
    let corpus = [
        "the cat sat on the mat",
        "the dog sat on the rug",
        "the cat saw the dog",
        "the cat sat on the mat",
        "the dog sat on the rug",
        "the cat saw the dog",
        "the cat sat on the mat",
        "the dog sat on the rug",
        "the cat saw the dog",
    ];
    let mut model = LanguageModel::new(2)?;
    model.train(corpus);

    // Counts survive only above the rare-event threshold; everything
    // below is folded into the per-order unknown bucket
    println!("count('the') = {}", model.count(&["the"]));
    println!("count('the cat') = {}", model.count(&["the", "cat"]));
    println!("unknown bucket (unigrams) = {}", model.unknown_count(1));

    // Smoothed conditional probability with an explicit discount
    println!("P(cat | the) = {:.6}", model.probability(0.75, 2, &["the", "cat"])?);
    println!("P(the) = {:.6}", model.probability(0.75, 1, &["the"])?);

    // Save and reload: the byte form round-trips the full table set
    let path = std::env::temp_dir().join("rs-lm-exemple.lm");
    model.save_to_file(&path)?;
    let model = LanguageModel::read_from_file(&path)?;

    // Score sentences with the conventional discount (0.75)
    let scorer = Scorer::new(&model);
    for sentence in ["the cat sat on the mat", "colorless green ideas sleep"] {
        println!(
            "score = {:.6e}, perplexity = {:.3} <- {}",
            scorer.sentence_score(sentence)?,
            scorer.perplexity(sentence)?,
            sentence,
        );
    }

    // A custom estimator: gentler discount, explicit zero-count floor
    let scorer = Scorer::with_smoothing(&model, KneserNey::with_zero_floor(0.5, 2)?);
    println!(
        "aggregate perplexity = {:.3}",
        scorer.corpus_perplexity(["the cat sat on the mat", "the dog sat on the rug"])?
    );

    // Attempting an estimation outside the model contract
    match model.probability(0.75, 5, &["way", "too", "long", "for", "this"]) {
        Ok(_) => println!("Should not happen"),
        Err(_) => println!("Order 5 is invalid for a bigram model"),
    }

    Ok(())
}
