/*! Test coverage for the SSA program model.
 *
 * The model is the contract between the external front end and the code
 * generator, so these tests pin down the parts lowering relies on: builder
 * output shape, predecessor bookkeeping, validation, and the serialized
 * form.
 */
